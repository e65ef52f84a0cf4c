//! TOML configuration.
//!
//! ```toml
//! [feishu]
//! app_token = "bascnXXXX"
//!
//! [storage]
//! dir = "~/.openclaw/workspace/memory"
//!
//! [sync]
//! primary_table = "Table One"
//!
//! [[tables]]
//! id = "tblXXXX"
//! name = "Table One"
//! ```
//!
//! App credentials may live in `[feishu]` but are normally supplied through
//! `FEISHU_APP_ID` / `FEISHU_APP_SECRET`; see [`crate::feishu::AppCredentials`].

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::fields::parse_utc_offset;
use crate::render::RendererKind;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub feishu: FeishuConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub tables: Vec<TableConfig>,
    #[serde(default)]
    pub reindex: ReindexConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FeishuConfig {
    /// Bitable app token (the remote collection id).
    pub app_token: String,
    #[serde(default)]
    pub app_id: Option<String>,
    #[serde(default)]
    pub app_secret: Option<String>,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_auth_timeout_secs")]
    pub auth_timeout_secs: u64,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://open.feishu.cn/open-apis".to_string()
}
fn default_auth_timeout_secs() -> u64 {
    15
}
fn default_fetch_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub dir: PathBuf,
    #[serde(default = "default_extension")]
    pub extension: String,
    #[serde(default)]
    pub index_path: Option<PathBuf>,
    #[serde(default)]
    pub adopt_glob: Option<String>,
}

fn default_extension() -> String {
    "md".to_string()
}

impl StorageConfig {
    /// Location of the SQLite sync index.
    pub fn index_path(&self) -> PathBuf {
        self.index_path
            .clone()
            .unwrap_or_else(|| self.dir.join(".bsync-index.sqlite"))
    }

    /// Filename pattern for documents adopted from disk into the index.
    pub fn adopt_glob(&self) -> String {
        self.adopt_glob
            .clone()
            .unwrap_or_else(|| format!("rec*.{}", self.extension))
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SyncConfig {
    /// Display name of the table rendered with the `material` layout.
    #[serde(default)]
    pub primary_table: Option<String>,
    /// Offset used to turn epoch timestamps into dates, e.g. `"+08:00"`.
    /// Defaults to the host's local offset.
    #[serde(default)]
    pub utc_offset: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TableConfig {
    pub id: String,
    pub name: String,
    /// Explicit renderer: `material`, `knowledge` or `generic`.
    #[serde(default)]
    pub schema: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReindexConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_reindex_program")]
    pub program: String,
    #[serde(default = "default_reindex_args")]
    pub args: Vec<String>,
    #[serde(default = "default_reindex_dir")]
    pub working_dir: Option<PathBuf>,
}

impl Default for ReindexConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            program: default_reindex_program(),
            args: default_reindex_args(),
            working_dir: default_reindex_dir(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_reindex_program() -> String {
    "npx".to_string()
}
fn default_reindex_args() -> Vec<String> {
    ["openclaw", "memory", "index", "--force"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_reindex_dir() -> Option<PathBuf> {
    Some(PathBuf::from("~/.openclaw"))
}

impl Config {
    /// Find a configured table by id or display name.
    pub fn find_table(&self, key: &str) -> Option<&TableConfig> {
        self.tables
            .iter()
            .find(|t| t.id == key)
            .or_else(|| self.tables.iter().find(|t| t.name == key))
    }
}

/// Expand a leading `~` to `$HOME`.
pub fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(rest),
        None => path.to_path_buf(),
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_config(&content)
}

/// Parse and validate configuration text.
pub fn parse_config(content: &str) -> Result<Config> {
    let mut config: Config =
        toml::from_str(content).with_context(|| "Failed to parse config file")?;

    config.storage.dir = expand_home(&config.storage.dir);
    config.storage.index_path = config.storage.index_path.as_deref().map(expand_home);
    config.reindex.working_dir = config.reindex.working_dir.as_deref().map(expand_home);

    // Validate remote
    if config.feishu.app_token.trim().is_empty() {
        bail!("feishu.app_token must not be empty");
    }
    if config.feishu.auth_timeout_secs == 0 || config.feishu.fetch_timeout_secs == 0 {
        bail!("feishu timeouts must be > 0");
    }

    // Validate storage
    let ext = &config.storage.extension;
    if ext.is_empty() || ext.contains('.') || ext.contains('/') {
        bail!(
            "storage.extension must be a bare extension like \"md\", got '{}'",
            ext
        );
    }

    // Validate tables
    if config.tables.is_empty() {
        bail!("at least one [[tables]] entry is required");
    }
    let mut seen = HashSet::new();
    for table in &config.tables {
        if table.id.trim().is_empty() {
            bail!("table id must not be empty (table '{}')", table.name);
        }
        if !seen.insert(table.id.as_str()) {
            bail!("duplicate table id: '{}'", table.id);
        }
        if let Some(tag) = &table.schema {
            if RendererKind::from_tag(tag).is_none() {
                bail!(
                    "Unknown schema '{}' for table '{}'. Must be material, knowledge, or generic.",
                    tag,
                    table.id
                );
            }
        }
    }

    if let Some(offset) = &config.sync.utc_offset {
        if parse_utc_offset(offset).is_none() {
            bail!(
                "sync.utc_offset must look like \"+08:00\", got '{}'",
                offset
            );
        }
    }

    if config.reindex.enabled && config.reindex.program.trim().is_empty() {
        bail!("reindex.program must not be empty when reindex is enabled");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[feishu]
app_token = "bascn123"

[storage]
dir = "/tmp/memory"

[[tables]]
id = "tbl1"
name = "Table One"
"#;

    #[test]
    fn test_minimal_defaults() {
        let cfg = parse_config(MINIMAL).unwrap();
        assert_eq!(cfg.feishu.base_url, "https://open.feishu.cn/open-apis");
        assert_eq!(cfg.feishu.auth_timeout_secs, 15);
        assert_eq!(cfg.feishu.fetch_timeout_secs, 30);
        assert_eq!(cfg.storage.extension, "md");
        assert_eq!(
            cfg.storage.index_path(),
            PathBuf::from("/tmp/memory/.bsync-index.sqlite")
        );
        assert_eq!(cfg.storage.adopt_glob(), "rec*.md");
        assert!(cfg.reindex.enabled);
        assert_eq!(cfg.reindex.program, "npx");
        assert_eq!(cfg.reindex.args, vec!["openclaw", "memory", "index", "--force"]);
    }

    #[test]
    fn test_requires_tables() {
        let text = r#"
[feishu]
app_token = "bascn123"

[storage]
dir = "/tmp/memory"
"#;
        let err = parse_config(text).unwrap_err();
        assert!(err.to_string().contains("tables"));
    }

    #[test]
    fn test_rejects_duplicate_table_ids() {
        let text = format!("{}\n[[tables]]\nid = \"tbl1\"\nname = \"Again\"\n", MINIMAL);
        let err = parse_config(&text).unwrap_err();
        assert!(err.to_string().contains("duplicate table id"));
    }

    #[test]
    fn test_rejects_unknown_schema() {
        let text = format!(
            "{}\n[[tables]]\nid = \"tbl2\"\nname = \"Two\"\nschema = \"fancy\"\n",
            MINIMAL
        );
        let err = parse_config(&text).unwrap_err();
        assert!(err.to_string().contains("Unknown schema"));
    }

    #[test]
    fn test_rejects_dotted_extension() {
        let text = MINIMAL.replace("dir = \"/tmp/memory\"", "dir = \"/tmp/memory\"\nextension = \".md\"");
        assert!(parse_config(&text).is_err());
    }

    #[test]
    fn test_rejects_bad_offset() {
        let text = format!("{}\n[sync]\nutc_offset = \"eight\"\n", MINIMAL);
        assert!(parse_config(&text).is_err());
    }

    #[test]
    fn test_find_table_by_id_or_name() {
        let cfg = parse_config(MINIMAL).unwrap();
        assert_eq!(cfg.find_table("tbl1").unwrap().name, "Table One");
        assert_eq!(cfg.find_table("Table One").unwrap().id, "tbl1");
        assert!(cfg.find_table("nope").is_none());
    }

    #[test]
    fn test_expand_home() {
        if let Some(home) = std::env::var_os("HOME") {
            assert_eq!(
                expand_home(Path::new("~/notes")),
                PathBuf::from(home).join("notes")
            );
        }
        assert_eq!(expand_home(Path::new("/abs/notes")), PathBuf::from("/abs/notes"));
    }
}
