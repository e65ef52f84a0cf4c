//! Offline rendering.
//!
//! `bsync render` turns a saved record (as returned by the list endpoint)
//! into the document a sync would write, without contacting the service or
//! touching the document directory. Handy for checking a layout against
//! real data.

use anyhow::{bail, Context, Result};
use std::path::Path;

use crate::config::Config;
use crate::ingest::date_resolver;
use crate::models::RemoteRecord;
use crate::render::RendererRegistry;

/// Parse a JSON file holding one record object or an array of them.
pub fn read_records(path: &Path) -> Result<Vec<RemoteRecord>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read record file: {}", path.display()))?;
    parse_records(&content).with_context(|| format!("Invalid record JSON in {}", path.display()))
}

pub fn parse_records(content: &str) -> Result<Vec<RemoteRecord>> {
    let value: serde_json::Value = serde_json::from_str(content)?;
    let records = match value {
        serde_json::Value::Array(items) => items
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<RemoteRecord>, _>>()?,
        serde_json::Value::Object(_) => vec![serde_json::from_value(value)?],
        _ => bail!("expected a record object or an array of records"),
    };
    Ok(records)
}

/// Render every record in `path` with the renderer bound to `table`.
pub fn run_render(config: &Config, path: &Path, table: &str) -> Result<()> {
    let Some(table) = config.find_table(table) else {
        bail!("Unknown table: '{}'", table);
    };
    let renderers = RendererRegistry::from_config(config)?;
    let renderer = renderers.get(&table.id);
    let dates = date_resolver(config);

    let records = read_records(path)?;
    for (i, record) in records.iter().enumerate() {
        if i > 0 {
            println!("\n---\n");
        }
        print!("{}", renderer.render(record, &table.name, &dates));
    }
    Ok(())
}
