use anyhow::Result;
use sqlx::SqlitePool;

/// Create the sync index schema. Safe to run on every open.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    // One row per document this tool has written or adopted.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS synced_records (
            record_id TEXT PRIMARY KEY,
            table_id TEXT,
            file_name TEXT NOT NULL,
            content_hash TEXT,
            synced_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_synced_records_table ON synced_records(table_id)")
        .execute(pool)
        .await?;

    Ok(())
}
