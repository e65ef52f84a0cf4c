//! Exhaustive enumeration of a remote table.
//!
//! Pages are fetched strictly in sequence. Each request carries exactly the
//! cursor the previous response returned; a cursor is never built or
//! guessed locally, so no page is skipped and none is fetched twice.
//!
//! A failed page does not discard earlier pages: the caller receives what
//! was accumulated together with the failure and decides whether the run
//! can continue.

use std::collections::HashSet;
use tracing::warn;

use crate::error::SourceError;
use crate::models::{Credential, Cursor, RemoteRecord};
use crate::traits::RecordSource;

/// All records read from one table.
#[derive(Debug, Default)]
pub struct Enumeration {
    /// Distinct records in service order.
    pub records: Vec<RemoteRecord>,
    /// Pages successfully fetched.
    pub pages: usize,
    /// Records dropped because their id had already been seen.
    pub duplicates: usize,
    /// Records dropped because they had no id.
    pub missing_ids: usize,
    /// Set when enumeration stopped before the last page.
    pub failure: Option<SourceError>,
}

impl Enumeration {
    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }
}

/// Read every page of `table_id`, starting without a cursor and stopping
/// when a page reports `has_more = false`.
pub async fn enumerate_all(
    source: &dyn RecordSource,
    token: &Credential,
    table_id: &str,
) -> Enumeration {
    let mut out = Enumeration::default();
    let mut seen: HashSet<String> = HashSet::new();
    let mut cursor: Option<Cursor> = None;

    loop {
        let page = match source.fetch_page(token, table_id, cursor.as_ref()).await {
            Ok(page) => page,
            Err(e) => {
                warn!(
                    table_id,
                    pages = out.pages,
                    records = out.records.len(),
                    "page fetch failed, keeping records read so far: {}",
                    e
                );
                out.failure = Some(e);
                break;
            }
        };
        out.pages += 1;

        for record in page.records {
            if record.record_id.is_empty() {
                out.missing_ids += 1;
                continue;
            }
            if seen.insert(record.record_id.clone()) {
                out.records.push(record);
            } else {
                out.duplicates += 1;
            }
        }

        if !page.has_more {
            break;
        }
        match page.next_cursor {
            Some(next) => cursor = Some(next),
            None => {
                warn!(table_id, "page has_more without page_token, stopping");
                out.failure = Some(SourceError::MissingCursor);
                break;
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Page;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    /// Serves a fixed list of pages; page `k` is requested with cursor `c{k}`.
    struct PagedSource {
        pages: Vec<Vec<&'static str>>,
        fail_at: Option<usize>,
        drop_cursor_at: Option<usize>,
        requests: Mutex<Vec<Option<String>>>,
    }

    impl PagedSource {
        fn new(pages: Vec<Vec<&'static str>>) -> Self {
            Self {
                pages,
                fail_at: None,
                drop_cursor_at: None,
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    fn rec(id: &str) -> RemoteRecord {
        serde_json::from_value(json!({ "record_id": id, "fields": {"标题": id} })).unwrap()
    }

    #[async_trait]
    impl RecordSource for PagedSource {
        async fn acquire_token(&self) -> Result<Credential, SourceError> {
            Ok(Credential::new("t"))
        }

        async fn fetch_page(
            &self,
            _token: &Credential,
            _table_id: &str,
            cursor: Option<&Cursor>,
        ) -> Result<Page, SourceError> {
            self.requests
                .lock()
                .unwrap()
                .push(cursor.map(|c| c.as_str().to_string()));
            let k = match cursor {
                None => 0,
                Some(c) => c.as_str()[1..].parse::<usize>().unwrap(),
            };
            if self.fail_at == Some(k) {
                return Err(SourceError::Api {
                    code: 1254002,
                    msg: "Fail".to_string(),
                });
            }
            let has_more = k + 1 < self.pages.len();
            let next_cursor = if has_more && self.drop_cursor_at != Some(k) {
                Some(Cursor::new(format!("c{}", k + 1)))
            } else {
                None
            };
            Ok(Page {
                records: self.pages[k].iter().map(|id| rec(id)).collect(),
                has_more,
                next_cursor,
            })
        }
    }

    fn ids(e: &Enumeration) -> Vec<&str> {
        e.records.iter().map(|r| r.record_id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_single_page() {
        let source = PagedSource::new(vec![vec!["rec1", "rec2"]]);
        let e = enumerate_all(&source, &Credential::new("t"), "tbl").await;
        assert!(e.is_complete());
        assert_eq!(e.pages, 1);
        assert_eq!(ids(&e), vec!["rec1", "rec2"]);
    }

    #[tokio::test]
    async fn test_union_of_all_pages_for_any_page_count() {
        let all: Vec<&'static str> = vec![
            "r0", "r1", "r2", "r3", "r4", "r5", "r6", "r7", "r8", "r9", "r10", "r11",
        ];
        for n in 1..=all.len() {
            let pages: Vec<Vec<&'static str>> = all
                .chunks(all.len().div_ceil(n))
                .map(|c| c.to_vec())
                .collect();
            let page_count = pages.len();
            let source = PagedSource::new(pages);
            let e = enumerate_all(&source, &Credential::new("t"), "tbl").await;
            assert!(e.is_complete());
            assert_eq!(e.pages, page_count);
            assert_eq!(ids(&e), all, "page count {}", page_count);
        }
    }

    #[tokio::test]
    async fn test_passes_back_exact_cursors() {
        let source = PagedSource::new(vec![vec!["a"], vec!["b"], vec!["c"]]);
        enumerate_all(&source, &Credential::new("t"), "tbl").await;
        let requests = source.requests.lock().unwrap().clone();
        assert_eq!(
            requests,
            vec![None, Some("c1".to_string()), Some("c2".to_string())]
        );
    }

    #[tokio::test]
    async fn test_failure_keeps_earlier_pages() {
        let mut source = PagedSource::new(vec![vec!["a", "b"], vec!["c"], vec!["d"]]);
        source.fail_at = Some(2);
        let e = enumerate_all(&source, &Credential::new("t"), "tbl").await;
        assert!(!e.is_complete());
        assert!(matches!(e.failure, Some(SourceError::Api { code: 1254002, .. })));
        assert_eq!(ids(&e), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_failure_on_first_page() {
        let mut source = PagedSource::new(vec![vec!["a"]]);
        source.fail_at = Some(0);
        let e = enumerate_all(&source, &Credential::new("t"), "tbl").await;
        assert!(e.records.is_empty());
        assert_eq!(e.pages, 0);
        assert!(e.failure.is_some());
    }

    #[tokio::test]
    async fn test_missing_cursor_stops() {
        let mut source = PagedSource::new(vec![vec!["a"], vec!["b"]]);
        source.drop_cursor_at = Some(0);
        let e = enumerate_all(&source, &Credential::new("t"), "tbl").await;
        assert!(matches!(e.failure, Some(SourceError::MissingCursor)));
        assert_eq!(ids(&e), vec!["a"]);
        assert_eq!(source.requests.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_drops_duplicates_and_blank_ids() {
        let source = PagedSource::new(vec![vec!["a", "b"], vec!["b", "", "c"]]);
        let e = enumerate_all(&source, &Credential::new("t"), "tbl").await;
        assert_eq!(ids(&e), vec!["a", "b", "c"]);
        assert_eq!(e.duplicates, 1);
        assert_eq!(e.missing_ids, 1);
    }
}
