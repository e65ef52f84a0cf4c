use anyhow::Result;

use crate::config::Config;
use crate::render::RendererRegistry;

/// Print every configured table with the renderer it resolves to.
pub fn list_tables(config: &Config) -> Result<()> {
    let renderers = RendererRegistry::from_config(config)?;

    println!("{:<24} {:<24} RENDERER", "TABLE ID", "NAME");
    for table in &config.tables {
        println!(
            "{:<24} {:<24} {}",
            table.id,
            table.name,
            renderers.get(&table.id).tag()
        );
    }

    Ok(())
}
