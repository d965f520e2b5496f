//! CLI command implementations

use std::path::Path;

use anyhow::{Context, Result};
use salespipe_core::{ConfigSources, PipelineConfig, PipelineSettings};

pub mod check;
pub mod init;
pub mod query;
pub mod run;

/// Build the run configuration from the settings file and environment
fn load_config(config_path: Option<&Path>, sources: ConfigSources) -> Result<PipelineConfig> {
    let settings = PipelineSettings::discover(config_path, Path::new("."))
        .context("Failed to load pipeline settings")?;
    sources.resolve(settings).context("Failed to resolve run configuration")
}
