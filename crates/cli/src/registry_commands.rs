use std::path::{Path, PathBuf};

use {anyhow::Context, herald_config::HeraldConfig, tracing::info};

use crate::open_registry;

/// Write the registry table to `output`, or stdout.
pub async fn export(
    config: &HeraldConfig,
    data_dir: Option<&PathBuf>,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let registry = open_registry(config, data_dir).await?;
    let table = registry.export().await?;

    match output {
        Some(path) => {
            tokio::fs::write(path, table.as_bytes())
                .await
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!(path = %path.display(), "registry exported");
        },
        None => print!("{table}"),
    }
    Ok(())
}

pub async fn list(
    config: &HeraldConfig,
    data_dir: Option<&PathBuf>,
    json: bool,
) -> anyhow::Result<()> {
    let registry = open_registry(config, data_dir).await?;
    let rows = registry.scan().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }
    if rows.is_empty() {
        println!("No subscriptions.");
        return Ok(());
    }
    println!("destination_id\tdestination_label\tfrequency\tsource_id");
    for row in &rows {
        println!(
            "{}\t{}\t{}\t{}",
            row.destination_id, row.destination_label, row.frequency, row.source_id
        );
    }
    Ok(())
}
