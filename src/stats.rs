//! Sync index statistics.
//!
//! Provides a quick summary of what has been mirrored: ledger size,
//! documents on disk, and a per-table breakdown with the last sync time.
//! Used by `bsync status` to confirm scheduled syncs are landing.

use anyhow::Result;

use crate::config::Config;
use crate::ledger::Ledger;
use crate::storage::DocumentStore;

/// Run the status command: read the ledger and print a summary.
pub async fn run_status(config: &Config) -> Result<()> {
    let store = DocumentStore::open(
        &config.storage.dir,
        &config.storage.extension,
        &config.storage.adopt_glob(),
    )?;
    let index_path = config.storage.index_path();
    let ledger = Ledger::open(&index_path).await?;

    let total = ledger.count().await?;
    let on_disk = store.scan()?.len();
    let table_stats = ledger.table_stats().await?;
    ledger.close().await;

    let index_size = std::fs::metadata(&index_path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("Bitable Sync Status");
    println!("===================");
    println!();
    println!("  Documents:   {}", store.dir().display());
    println!("  Index:       {} ({})", index_path.display(), format_bytes(index_size));
    println!();
    println!("  Synced:      {}", total);
    println!("  On disk:     {}", on_disk);

    if !table_stats.is_empty() {
        println!();
        println!("  By table:");
        println!("  {:<28} {:>6}   {}", "TABLE", "DOCS", "LAST SYNC");
        println!("  {}", "-".repeat(56));

        for s in &table_stats {
            let label = match &s.table_id {
                Some(id) => match config.tables.iter().find(|t| &t.id == id) {
                    Some(t) => format!("{} ({})", t.name, id),
                    None => id.clone(),
                },
                None => "(adopted from disk)".to_string(),
            };
            println!(
                "  {:<28} {:>6}   {}",
                label,
                s.doc_count,
                format_ts_relative(s.last_synced)
            );
        }
    }

    println!();
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

/// Format a Unix timestamp as a relative time string (e.g. "3 hours ago").
fn format_ts_relative(ts: i64) -> String {
    let delta = chrono::Utc::now().timestamp() - ts;

    if delta < 0 {
        format_ts_iso(ts)
    } else if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        format_ts_iso(ts)
    }
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}
