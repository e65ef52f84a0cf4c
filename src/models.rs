//! Core data models used throughout the sync pipeline.
//!
//! These types represent the credentials, table descriptors, remote records,
//! and run summaries that flow between the Feishu client, the enumerator,
//! the renderers, and the orchestrator.

use serde::Deserialize;
use std::fmt;

use crate::fields::FieldValue;

/// Short-lived tenant access token.
///
/// Owned by a single sync run and never persisted. `Debug` redacts the
/// secret so credentials never end up in logs.
#[derive(Clone)]
pub struct Credential {
    token: String,
}

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    /// The raw bearer value sent in the `Authorization` header.
    pub fn bearer(&self) -> &str {
        &self.token
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Opaque pagination position returned by the list endpoint.
///
/// Cursors are only ever constructed from a service response and are
/// passed back verbatim on the next request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor(String);

impl Cursor {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One row of a remote table.
///
/// `fields` keeps the order in which the service returned the columns.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteRecord {
    #[serde(default)]
    pub record_id: String,
    #[serde(default)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl RemoteRecord {
    /// Look up a field, converting the raw JSON into a [`FieldValue`].
    ///
    /// Returns `None` when the column is absent from the record.
    pub fn field(&self, name: &str) -> Option<FieldValue> {
        self.fields.get(name).map(FieldValue::from)
    }

    /// Iterate over all fields in service order.
    pub fn iter_fields(&self) -> impl Iterator<Item = (&str, FieldValue)> {
        self.fields
            .iter()
            .map(|(k, v)| (k.as_str(), FieldValue::from(v)))
    }
}

/// One page of results from the list endpoint.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub records: Vec<RemoteRecord>,
    pub has_more: bool,
    pub next_cursor: Option<Cursor>,
}

/// Per-table summary of a sync run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableReport {
    pub table_id: String,
    pub table_name: String,
    /// Distinct records enumerated from the remote table.
    pub fetched: usize,
    /// Documents newly written during this run.
    pub written: usize,
    /// Records skipped because a document already existed.
    pub skipped: usize,
    /// Records dropped during enumeration (blank or repeated ids).
    pub dropped: usize,
    /// Records whose document could not be written.
    pub failed: usize,
    /// Set when enumeration stopped early because a page fetch failed.
    pub truncated: bool,
}

impl TableReport {
    /// False when a read stopped early or any document failed to write.
    pub fn is_complete(&self) -> bool {
        !self.truncated && self.failed == 0
    }
}

/// Outcome of the external reindex step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReindexOutcome {
    /// Nothing new was written, so the indexer was not invoked.
    NotNeeded,
    /// Reindexing was disabled by configuration or flag.
    Disabled,
    Succeeded,
    Failed(String),
}

/// Aggregate result of one orchestrator run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncResult {
    /// Documents known to exist before the run began.
    pub existing: usize,
    /// Documents written during the run.
    pub written: usize,
    pub tables: Vec<TableReport>,
    pub reindex: ReindexOutcome,
}

impl SyncResult {
    pub fn total_fetched(&self) -> usize {
        self.tables.iter().map(|t| t.fetched).sum()
    }
}
