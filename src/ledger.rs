//! Persisted index of synced record ids.
//!
//! The ledger is the membership set consulted before every write. It is
//! loaded once per run and updated one row per transaction immediately
//! after each document lands on disk.
//!
//! The document directory stays authoritative for deletions: at the start
//! of a run [`reconcile`] forgets rows whose file is gone (so an externally
//! deleted document is synced again) and adopts matching files that were
//! written before the ledger existed.

use anyhow::Result;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

use crate::db;
use crate::migrate;
use crate::storage::DocumentStore;

/// One ledger row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub record_id: String,
    /// `None` for documents adopted from disk.
    pub table_id: Option<String>,
    pub file_name: String,
    pub content_hash: Option<String>,
    pub synced_at: i64,
}

impl LedgerEntry {
    /// Entry for a document written by this run.
    pub fn written(record_id: &str, table_id: &str, file_name: &str, content: &str) -> Self {
        Self {
            record_id: record_id.to_string(),
            table_id: Some(table_id.to_string()),
            file_name: file_name.to_string(),
            content_hash: Some(content_hash(content.as_bytes())),
            synced_at: chrono::Utc::now().timestamp(),
        }
    }
}

pub fn content_hash(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Aggregate ledger counts for one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableStats {
    pub table_id: Option<String>,
    pub doc_count: i64,
    pub last_synced: i64,
}

pub struct Ledger {
    pool: SqlitePool,
}

impl Ledger {
    /// Open the ledger at `path`, creating the schema if needed.
    pub async fn open(path: &Path) -> Result<Self> {
        let pool = db::connect(path).await?;
        migrate::run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn ids(&self) -> Result<HashSet<String>> {
        let rows: Vec<String> = sqlx::query_scalar("SELECT record_id FROM synced_records")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().collect())
    }

    pub async fn entries(&self) -> Result<Vec<LedgerEntry>> {
        let rows: Vec<(String, Option<String>, String, Option<String>, i64)> = sqlx::query_as(
            "SELECT record_id, table_id, file_name, content_hash, synced_at FROM synced_records ORDER BY record_id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(
                |(record_id, table_id, file_name, content_hash, synced_at)| LedgerEntry {
                    record_id,
                    table_id,
                    file_name,
                    content_hash,
                    synced_at,
                },
            )
            .collect())
    }

    pub async fn count(&self) -> Result<i64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM synced_records")
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }

    /// Per-table row counts and latest sync time, largest tables first.
    /// Adopted documents are grouped under `None`.
    pub async fn table_stats(&self) -> Result<Vec<TableStats>> {
        let rows: Vec<(Option<String>, i64, i64)> = sqlx::query_as(
            r#"
            SELECT table_id, COUNT(*) AS doc_count, MAX(synced_at) AS last_synced
            FROM synced_records
            GROUP BY table_id
            ORDER BY doc_count DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(table_id, doc_count, last_synced)| TableStats {
                table_id,
                doc_count,
                last_synced,
            })
            .collect())
    }

    /// Insert one entry in its own transaction. Existing rows are left untouched.
    pub async fn insert(&self, entry: &LedgerEntry) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            r#"
            INSERT INTO synced_records (record_id, table_id, file_name, content_hash, synced_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(record_id) DO NOTHING
            "#,
        )
        .bind(&entry.record_id)
        .bind(&entry.table_id)
        .bind(&entry.file_name)
        .bind(&entry.content_hash)
        .bind(entry.synced_at)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn remove(&self, record_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM synced_records WHERE record_id = ?")
            .bind(record_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

/// What [`reconcile`] changed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    /// Files on disk that were added to the ledger.
    pub adopted: usize,
    /// Ledger rows dropped because their file no longer exists.
    pub forgotten: usize,
}

/// Bring the ledger in line with the document directory.
pub async fn reconcile(ledger: &Ledger, store: &DocumentStore) -> Result<Reconciliation> {
    let mut report = Reconciliation::default();

    let mut known = HashSet::new();
    for entry in ledger.entries().await? {
        if store.file_exists(&entry.file_name) {
            known.insert(entry.record_id);
        } else {
            debug!(record_id = %entry.record_id, "document removed externally, forgetting");
            ledger.remove(&entry.record_id).await?;
            report.forgotten += 1;
        }
    }

    for doc in store.scan()? {
        if known.contains(&doc.record_id) {
            continue;
        }
        let hash = std::fs::read(store.dir().join(&doc.file_name))
            .ok()
            .map(|bytes| content_hash(&bytes));
        let entry = LedgerEntry {
            record_id: doc.record_id,
            table_id: None,
            file_name: doc.file_name,
            content_hash: hash,
            synced_at: chrono::Utc::now().timestamp(),
        };
        if ledger.insert(&entry).await? {
            report.adopted += 1;
        }
    }

    if report.adopted > 0 || report.forgotten > 0 {
        info!(
            adopted = report.adopted,
            forgotten = report.forgotten,
            "reconciled sync index with document directory"
        );
    }
    Ok(report)
}
