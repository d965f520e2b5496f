//! Run the full pipeline

use std::path::Path;

use anyhow::{Context, Result};
use salespipe_core::ConfigSources;
use salespipe_runtime::{Pipeline, RunSummary};

/// Run the run command
pub async fn run(config_path: Option<&Path>, sources: ConfigSources, json: bool) -> Result<()> {
    let config = super::load_config(config_path, sources)?;
    config.db_url().context("Failed to resolve run configuration")?;
    tracing::info!("Reading sales data from {}", config.raw_csv_path.display());

    let mut pipeline = Pipeline::new(config);
    let summary = pipeline.run().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary, &pipeline.config().settings.table_name);
    }
    Ok(())
}

fn print_summary(summary: &RunSummary, table_name: &str) {
    println!("run {}", summary.run_id);
    println!(
        "  rows: {} read, {} duplicates removed, {} cleaned",
        summary.rows_read, summary.duplicates_removed, summary.rows_cleaned
    );
    if !summary.conversion_warnings.is_empty() {
        println!(
            "  {} column(s) kept their original type",
            summary.conversion_warnings.len()
        );
    }
    for chart in &summary.charts {
        println!("  chart: {}", chart.display());
    }
    println!("  loaded {} rows into {}", summary.rows_loaded, table_name);
}
