//! Seams between the sync pipeline and its external collaborators.
//!
//! ```text
//! ┌──────────────┐   ┌────────────┐   ┌───────────┐   ┌───────────┐
//! │ RecordSource │──▶│ enumerate  │──▶│ renderers │──▶│ Reindexer │
//! │  (Feishu)    │   │ all pages  │   │ + storage │   │ (command) │
//! └──────────────┘   └────────────┘   └───────────┘   └───────────┘
//! ```
//!
//! The production implementations are [`crate::feishu::FeishuClient`] and
//! [`crate::reindex::CommandReindexer`]. Tests substitute in-memory fakes.

use anyhow::Result;
use async_trait::async_trait;

use crate::error::SourceError;
use crate::models::{Credential, Cursor, Page};

/// A paginated, tabular remote data source.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Obtain a credential for this run.
    ///
    /// Any failure here is fatal to the run: nothing else can succeed
    /// without a token.
    async fn acquire_token(&self) -> Result<Credential, SourceError>;

    /// Fetch one page of `table_id`.
    ///
    /// `cursor` is `None` for the first page, and otherwise exactly the
    /// cursor returned by the previous page.
    async fn fetch_page(
        &self,
        token: &Credential,
        table_id: &str,
        cursor: Option<&Cursor>,
    ) -> Result<Page, SourceError>;
}

/// Downstream index rebuild, run after new documents were written.
#[async_trait]
pub trait Reindexer: Send + Sync {
    /// One-line description for status output.
    fn describe(&self) -> String;

    async fn reindex(&self) -> Result<()>;
}
