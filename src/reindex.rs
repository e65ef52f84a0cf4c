//! External index rebuild.
//!
//! After a run writes new documents, the downstream memory indexer is
//! invoked as an opaque command (by default `npx openclaw memory index --force`
//! in `~/.openclaw`). Only its exit status is interpreted; the tail of its
//! output is logged.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::process::Command;
use tracing::info;

use crate::config::ReindexConfig;
use crate::traits::Reindexer;

/// Output lines kept from the indexer.
const TAIL_LINES: usize = 5;

pub struct CommandReindexer {
    program: String,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
}

impl CommandReindexer {
    pub fn new(program: impl Into<String>, args: Vec<String>, working_dir: Option<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args,
            working_dir,
        }
    }

    pub fn from_config(config: &ReindexConfig) -> Self {
        Self::new(
            config.program.clone(),
            config.args.clone(),
            config.working_dir.clone(),
        )
    }
}

#[async_trait]
impl Reindexer for CommandReindexer {
    fn describe(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        if let Some(dir) = &self.working_dir {
            line.push_str(&format!(" (in {})", dir.display()));
        }
        line
    }

    async fn reindex(&self) -> Result<()> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        let output = cmd
            .output()
            .await
            .with_context(|| format!("Failed to execute '{}'", self.program))?;

        let mut combined = String::from_utf8_lossy(&output.stdout).to_string();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        for line in tail(&combined, TAIL_LINES) {
            info!("{}", line);
        }

        if !output.status.success() {
            bail!(
                "'{}' exited with {}: {}",
                self.describe(),
                output.status,
                tail(&combined, TAIL_LINES).join(" / ")
            );
        }
        Ok(())
    }
}

fn tail(text: &str, n: usize) -> Vec<&str> {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    lines[lines.len().saturating_sub(n)..].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tail() {
        let text = "1\n2\n\n3\n4\n5\n6\n";
        assert_eq!(tail(text, 5), vec!["2", "3", "4", "5", "6"]);
        assert_eq!(tail("only", 5), vec!["only"]);
        assert!(tail("", 5).is_empty());
    }

    #[test]
    fn test_describe() {
        let r = CommandReindexer::new(
            "npx",
            vec!["openclaw".into(), "memory".into()],
            Some(PathBuf::from("/opt/claw")),
        );
        assert_eq!(r.describe(), "npx openclaw memory (in /opt/claw)");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_reindex_success_and_failure() {
        let ok = CommandReindexer::new("sh", vec!["-c".into(), "echo indexed".into()], None);
        assert!(ok.reindex().await.is_ok());

        let fail = CommandReindexer::new("sh", vec!["-c".into(), "echo boom >&2; exit 3".into()], None);
        let err = fail.reindex().await.unwrap_err();
        assert!(err.to_string().contains("boom"));
    }

    #[tokio::test]
    async fn test_reindex_missing_program() {
        let r = CommandReindexer::new("definitely-not-a-real-program-bsync", vec![], None);
        assert!(r.reindex().await.is_err());
    }
}
