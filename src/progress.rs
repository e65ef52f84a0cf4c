//! Sync progress reporting.
//!
//! Reports observable progress during `bsync sync` so users see which table
//! is being read and how many documents have been written. Progress is
//! emitted on **stderr** so stdout remains parseable for scripts.

use std::io::Write;

/// A single progress event for sync.
#[derive(Clone, Debug)]
pub enum SyncProgressEvent {
    /// Exchanging app secrets for an access token.
    Authenticating,
    /// Reading all pages of a table (total unknown).
    Enumerating { table: String },
    /// A table finished enumerating.
    Enumerated {
        table: String,
        records: u64,
        complete: bool,
    },
    /// A new document was written.
    Written {
        table: String,
        record_id: String,
        title: String,
        n: u64,
    },
    /// Running the external indexer.
    Reindexing,
}

/// Reports sync progress. Implementations write to stderr (human or JSON).
pub trait SyncProgressReporter: Send + Sync {
    /// Emit a progress event. Called from the sync pipeline.
    fn report(&self, event: SyncProgressEvent);
}

/// Human-friendly progress on stderr: "sync Table One  + rec123  Title".
pub struct StderrProgress;

impl SyncProgressReporter for StderrProgress {
    fn report(&self, event: SyncProgressEvent) {
        let line = match &event {
            SyncProgressEvent::Authenticating => "sync  authenticating...\n".to_string(),
            SyncProgressEvent::Enumerating { table } => {
                format!("sync {}  enumerating...\n", table)
            }
            SyncProgressEvent::Enumerated {
                table,
                records,
                complete,
            } => {
                let suffix = if *complete { "" } else { " (incomplete)" };
                format!(
                    "sync {}  {} records{}\n",
                    table,
                    format_number(*records),
                    suffix
                )
            }
            SyncProgressEvent::Written {
                table,
                record_id,
                title,
                ..
            } => format!("sync {}  + {}  {}\n", table, record_id, title),
            SyncProgressEvent::Reindexing => "sync  rebuilding index...\n".to_string(),
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl SyncProgressReporter for JsonProgress {
    fn report(&self, event: SyncProgressEvent) {
        let obj = match &event {
            SyncProgressEvent::Authenticating => serde_json::json!({
                "event": "progress",
                "phase": "authenticating"
            }),
            SyncProgressEvent::Enumerating { table } => serde_json::json!({
                "event": "progress",
                "phase": "enumerating",
                "table": table
            }),
            SyncProgressEvent::Enumerated {
                table,
                records,
                complete,
            } => serde_json::json!({
                "event": "progress",
                "phase": "enumerated",
                "table": table,
                "records": records,
                "complete": complete
            }),
            SyncProgressEvent::Written {
                table,
                record_id,
                title,
                n,
            } => serde_json::json!({
                "event": "progress",
                "phase": "writing",
                "table": table,
                "record_id": record_id,
                "title": title,
                "n": n
            }),
            SyncProgressEvent::Reindexing => serde_json::json!({
                "event": "progress",
                "phase": "reindexing"
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl SyncProgressReporter for NoProgress {
    fn report(&self, _event: SyncProgressEvent) {}
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    /// Build a reporter for this mode.
    pub fn reporter(&self) -> Box<dyn SyncProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_number_comma() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1_234_567), "1,234,567");
    }
}
