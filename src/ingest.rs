//! Sync orchestration.
//!
//! Coordinates one run: reconcile the ledger with the document directory,
//! acquire a token, enumerate each configured table in order, render and
//! write every record not already synced, then trigger the external
//! indexer if anything new was written.
//!
//! Failure domains:
//!
//! | Failure | Effect |
//! |---------|--------|
//! | storage directory / ledger cannot be opened | run aborts |
//! | token request fails | run aborts |
//! | page fetch fails, several tables selected | that table keeps the records read so far; other tables continue |
//! | page fetch fails, one table selected | run aborts |
//! | one document cannot be written | counted as failed, the run continues |
//! | reindex command fails | reported, run still succeeds |

use anyhow::{anyhow, bail, Context, Result};
use std::collections::HashSet;
use tracing::{debug, info, warn};

use crate::config::{Config, TableConfig};
use crate::enumerate::enumerate_all;
use crate::feishu::FeishuClient;
use crate::fields::{parse_utc_offset, DateResolver};
use crate::ledger::{reconcile, Ledger, LedgerEntry};
use crate::models::{ReindexOutcome, SyncResult, TableReport};
use crate::progress::{SyncProgressEvent, SyncProgressReporter};
use crate::reindex::CommandReindexer;
use crate::render::RendererRegistry;
use crate::storage::{DocumentStore, WriteOutcome};
use crate::traits::{RecordSource, Reindexer};

/// Everything a run needs, with external collaborators behind traits.
pub struct SyncContext<'a> {
    pub source: &'a dyn RecordSource,
    /// `None` disables the post-sync index rebuild.
    pub reindexer: Option<&'a dyn Reindexer>,
    pub renderers: &'a RendererRegistry,
    pub dates: DateResolver,
    pub store: &'a DocumentStore,
    pub ledger: &'a Ledger,
    pub progress: &'a dyn SyncProgressReporter,
    /// Count new records without writing or reindexing.
    pub dry_run: bool,
}

/// CLI-level options for [`run_sync`].
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Table ids or names to sync; empty means all configured tables.
    pub tables: Vec<String>,
    pub dry_run: bool,
    pub no_reindex: bool,
}

/// Run a full sync from configuration and print a summary to stdout.
pub async fn run_sync(
    config: &Config,
    opts: &SyncOptions,
    progress: &dyn SyncProgressReporter,
) -> Result<SyncResult> {
    let tables = select_tables(config, &opts.tables)?;

    let store = DocumentStore::open(
        &config.storage.dir,
        &config.storage.extension,
        &config.storage.adopt_glob(),
    )?;
    let ledger = Ledger::open(&config.storage.index_path()).await?;
    reconcile(&ledger, &store).await?;

    let source = FeishuClient::from_config(&config.feishu)?;
    let renderers = RendererRegistry::from_config(config)?;
    let reindexer = CommandReindexer::from_config(&config.reindex);
    let reindex_enabled = config.reindex.enabled && !opts.no_reindex;

    let ctx = SyncContext {
        source: &source,
        reindexer: if reindex_enabled {
            Some(&reindexer as &dyn Reindexer)
        } else {
            None
        },
        renderers: &renderers,
        dates: date_resolver(config),
        store: &store,
        ledger: &ledger,
        progress,
        dry_run: opts.dry_run,
    };

    let result = sync_tables(&ctx, &tables).await;
    ledger.close().await;
    let result = result?;

    print_summary(&result, opts.dry_run);
    Ok(result)
}

/// Resolve `--table` selectors against configuration, keeping config order.
pub fn select_tables(config: &Config, selectors: &[String]) -> Result<Vec<TableConfig>> {
    if selectors.is_empty() {
        return Ok(config.tables.clone());
    }

    let mut wanted = HashSet::new();
    for key in selectors {
        match config.find_table(key) {
            Some(table) => {
                wanted.insert(table.id.clone());
            }
            None => bail!("Unknown table: '{}'", key),
        }
    }
    Ok(config
        .tables
        .iter()
        .filter(|t| wanted.contains(&t.id))
        .cloned()
        .collect())
}

/// Date resolver honouring `sync.utc_offset`, else the host offset.
pub fn date_resolver(config: &Config) -> DateResolver {
    config
        .sync
        .utc_offset
        .as_deref()
        .and_then(parse_utc_offset)
        .map(DateResolver::new)
        .unwrap_or_else(DateResolver::local)
}

/// Sync `tables` in order.
///
/// The membership set is loaded from the ledger once and grows as
/// documents are written, so a record seen twice within a run is written
/// at most once.
pub async fn sync_tables(ctx: &SyncContext<'_>, tables: &[TableConfig]) -> Result<SyncResult> {
    let mut synced: HashSet<String> = ctx.ledger.ids().await?;
    let existing = synced.len();

    ctx.progress.report(SyncProgressEvent::Authenticating);
    let token = ctx
        .source
        .acquire_token()
        .await
        .context("Failed to acquire tenant access token")?;

    let single_table = tables.len() == 1;
    let mut reports = Vec::with_capacity(tables.len());
    let mut total_written = 0usize;

    for table in tables {
        ctx.progress.report(SyncProgressEvent::Enumerating {
            table: table.name.clone(),
        });
        let enumeration = enumerate_all(ctx.source, &token, &table.id).await;
        let complete = enumeration.is_complete();
        ctx.progress.report(SyncProgressEvent::Enumerated {
            table: table.name.clone(),
            records: enumeration.records.len() as u64,
            complete,
        });

        if let Some(failure) = enumeration.failure {
            if single_table {
                return Err(anyhow!(failure))
                    .with_context(|| format!("Failed to read table '{}' ({})", table.name, table.id));
            }
            warn!(
                table = %table.name,
                table_id = %table.id,
                kept = enumeration.records.len(),
                "table read incomplete, continuing with other tables: {}",
                failure
            );
        }
        let dropped = enumeration.duplicates + enumeration.missing_ids;
        if dropped > 0 {
            info!(
                table = %table.name,
                duplicates = enumeration.duplicates,
                missing_ids = enumeration.missing_ids,
                "dropped records during enumeration"
            );
        }
        debug!(
            table = %table.name,
            pages = enumeration.pages,
            records = enumeration.records.len(),
            "enumerated table"
        );

        let renderer = ctx.renderers.get(&table.id);
        let mut report = TableReport {
            table_id: table.id.clone(),
            table_name: table.name.clone(),
            fetched: enumeration.records.len(),
            dropped,
            truncated: !complete,
            ..Default::default()
        };

        for record in &enumeration.records {
            if synced.contains(&record.record_id) {
                report.skipped += 1;
                continue;
            }
            if let Err(e) = ctx.store.check_record_id(&record.record_id) {
                warn!(table = %table.name, "skipping record: {:#}", e);
                report.failed += 1;
                continue;
            }

            if ctx.dry_run {
                synced.insert(record.record_id.clone());
                report.written += 1;
                continue;
            }

            let content = renderer.render(record, &table.name, &ctx.dates);
            let file_name = ctx.store.file_name(&record.record_id);
            let outcome = match ctx.store.write_new(&record.record_id, &content) {
                Ok(outcome) => outcome,
                Err(e) => {
                    // Not recorded, so the next run retries it.
                    warn!(
                        table = %table.name,
                        record_id = %record.record_id,
                        "failed to write document, continuing: {:#}",
                        e
                    );
                    report.failed += 1;
                    continue;
                }
            };
            match outcome {
                WriteOutcome::Written => {
                    ctx.ledger
                        .insert(&LedgerEntry::written(
                            &record.record_id,
                            &table.id,
                            &file_name,
                            &content,
                        ))
                        .await?;
                    report.written += 1;
                    total_written += 1;
                    ctx.progress.report(SyncProgressEvent::Written {
                        table: table.name.clone(),
                        record_id: record.record_id.clone(),
                        title: renderer.title_hint(record),
                        n: total_written as u64,
                    });
                }
                WriteOutcome::AlreadyExists => {
                    // On disk but outside the adopt glob: record it, leave the file alone.
                    ctx.ledger
                        .insert(&LedgerEntry {
                            record_id: record.record_id.clone(),
                            table_id: Some(table.id.clone()),
                            file_name,
                            content_hash: None,
                            synced_at: chrono::Utc::now().timestamp(),
                        })
                        .await?;
                    report.skipped += 1;
                }
            }
            synced.insert(record.record_id.clone());
        }

        reports.push(report);
    }

    let reindex = if total_written == 0 {
        ReindexOutcome::NotNeeded
    } else {
        match ctx.reindexer {
            None => ReindexOutcome::Disabled,
            Some(reindexer) => {
                ctx.progress.report(SyncProgressEvent::Reindexing);
                match reindexer.reindex().await {
                    Ok(()) => ReindexOutcome::Succeeded,
                    Err(e) => {
                        warn!("index rebuild failed: {:#}", e);
                        ReindexOutcome::Failed(format!("{:#}", e))
                    }
                }
            }
        }
    };

    Ok(SyncResult {
        existing,
        written: total_written,
        tables: reports,
        reindex,
    })
}

fn print_summary(result: &SyncResult, dry_run: bool) {
    if dry_run {
        println!("sync feishu (dry-run)");
    } else {
        println!("sync feishu");
    }
    println!("  existing documents: {}", result.existing);
    for table in &result.tables {
        let mut extra = String::new();
        if table.dropped > 0 {
            extra.push_str(&format!(", {} dropped", table.dropped));
        }
        if table.failed > 0 {
            extra.push_str(&format!(", {} failed", table.failed));
        }
        if !table.is_complete() {
            extra.push_str(" (incomplete)");
        }
        println!(
            "  {} ({}): {} records, {} new{}",
            table.table_name, table.table_id, table.fetched, table.written, extra
        );
    }
    if dry_run {
        let pending: usize = result.tables.iter().map(|t| t.written).sum();
        println!("  would write: {}", pending);
    } else {
        println!("  new documents: {}", result.written);
        match &result.reindex {
            ReindexOutcome::NotNeeded => println!("  reindex: skipped (no new records)"),
            ReindexOutcome::Disabled => println!("  reindex: disabled"),
            ReindexOutcome::Succeeded => println!("  reindex: ok"),
            ReindexOutcome::Failed(e) => println!("  reindex: failed ({})", e),
        }
    }
    println!("ok");
}
