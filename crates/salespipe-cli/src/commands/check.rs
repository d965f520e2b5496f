//! Check the input data without charts or database

use std::path::Path;

use anyhow::Result;
use salespipe_core::ConfigSources;
use salespipe_runtime::Pipeline;

/// Run the check command.
///
/// Missing columns fail the command; type mismatches and null warnings
/// are printed but do not.
pub fn run(config_path: Option<&Path>, sources: ConfigSources) -> Result<()> {
    let config = super::load_config(config_path, sources)?;
    let mut pipeline = Pipeline::new(config);
    let summary = pipeline.run_checks()?;

    println!(
        "rows: {} read, {} duplicates removed, {} cleaned",
        summary.rows_read, summary.duplicates_removed, summary.rows_cleaned
    );
    for warning in &summary.conversion_warnings {
        println!("{warning}");
    }
    if let Some(report) = &summary.validation {
        println!("{report}");
    }
    Ok(())
}
