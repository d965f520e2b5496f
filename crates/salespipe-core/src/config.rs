//! Configuration loading and validation
//!
//! Two layers feed a run:
//!
//! - `salespipe.yaml` - optional pipeline settings ([`PipelineSettings`])
//! - environment / command line - file locations and the database URL
//!   ([`ConfigSources`])
//!
//! Both are combined once at startup into a [`PipelineConfig`].

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::extract::CsvOptions;
use crate::schema::Schema;
use crate::sinks::IfExists;
use crate::transform::NullStrategy;
use crate::validate::{DEFAULT_NULL_THRESHOLD, Validator};

/// File name looked up when no `--config` is given
pub const DEFAULT_CONFIG_FILE: &str = "salespipe.yaml";

/// Directory charts are written to when `PLOT_PATH` is unset
pub const DEFAULT_PLOT_PATH: &str = "plots";

/// Pipeline settings from `salespipe.yaml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Target table name
    pub table_name: String,

    /// Behavior when the target table exists
    pub if_exists: IfExists,

    /// Maximum tolerated fraction of nulls per column
    pub null_threshold: f64,

    /// `drop` or `fill`
    pub null_strategy: String,

    /// Value used by the `fill` strategy
    pub fill_value: Option<String>,

    /// Fail the run when expected columns are missing
    pub strict_schema: bool,

    /// Delimited file options
    #[serde(flatten)]
    pub csv: CsvOptions,

    /// Number of products in the top-products chart
    pub top_n: usize,

    /// Date column for the sales-over-time chart
    pub date_col: String,

    /// Sales amount column for all charts
    pub sales_col: String,

    /// Product column for the top-products chart
    pub product_col: String,

    /// Expected column types
    pub expected_schema: Schema,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            table_name: "sales_data".to_string(),
            if_exists: IfExists::default(),
            null_threshold: DEFAULT_NULL_THRESHOLD,
            null_strategy: "drop".to_string(),
            fill_value: None,
            strict_schema: false,
            csv: CsvOptions::default(),
            top_n: 10,
            date_col: "date".to_string(),
            sales_col: "money".to_string(),
            product_col: "coffee_name".to_string(),
            expected_schema: Schema::coffee_sales(),
        }
    }
}

impl PipelineSettings {
    /// Load settings from a YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::ConfigNotFound {
                path: path.display().to_string(),
            });
        }
        let contents = std::fs::read_to_string(path)?;
        let settings: Self = serde_yaml::from_str(&contents)?;
        settings.validate()?;
        tracing::debug!("Loaded pipeline settings from {}", path.display());
        Ok(settings)
    }

    /// Load from an explicit path, or from `salespipe.yaml` in `dir` if it
    /// exists, falling back to defaults.
    ///
    /// An explicit path that does not exist is an error.
    pub fn discover(explicit: Option<&Path>, dir: &Path) -> Result<Self> {
        match explicit {
            Some(path) => Self::load(path),
            None => {
                let path = dir.join(DEFAULT_CONFIG_FILE);
                if path.exists() {
                    Self::load(path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Parsed null-handling strategy
    pub fn null_strategy(&self) -> Result<NullStrategy> {
        NullStrategy::parse(&self.null_strategy, self.fill_value.as_deref())
    }

    /// Validator built from the expected schema and threshold
    pub fn validator(&self) -> Result<Validator> {
        Validator::new(self.expected_schema.clone(), self.null_threshold)
    }

    /// Check values serde cannot check on its own
    pub fn validate(&self) -> Result<()> {
        let invalid = |message: String| Error::ConfigInvalid { message };

        if self.table_name.trim().is_empty() {
            return Err(invalid("table_name must not be empty".to_string()));
        }
        if self.top_n == 0 {
            return Err(invalid("top_n must be at least 1".to_string()));
        }
        self.null_strategy()
            .and_then(|_| self.validator())
            .map_err(|e| match e {
                Error::InvalidArgument { message } => invalid(message),
                other => other,
            })?;
        Ok(())
    }

    /// Starter YAML written by `salespipe init`
    pub fn template() -> Result<String> {
        let yaml = serde_yaml::to_string(&Self::default())?;
        Ok(format!("# salespipe pipeline settings\n{yaml}"))
    }
}

/// Raw values from the environment and command line
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// `RAW_CSV_PATH`
    pub raw_csv_path: Option<PathBuf>,
    /// `PROCESSED_CSV_PATH`
    pub processed_csv_path: Option<PathBuf>,
    /// `DB_URL`
    pub db_url: Option<String>,
    /// `PLOT_PATH`
    pub plot_path: Option<PathBuf>,
}

impl ConfigSources {
    /// Combine with `settings`, checking that required values are present
    pub fn resolve(self, settings: PipelineSettings) -> Result<PipelineConfig> {
        settings.validate()?;
        Ok(PipelineConfig {
            raw_csv_path: required_path(self.raw_csv_path, "RAW_CSV_PATH")?,
            processed_csv_path: required_path(self.processed_csv_path, "PROCESSED_CSV_PATH")?,
            db_url: self.db_url.filter(|url| !url.trim().is_empty()),
            plot_path: self
                .plot_path
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_PLOT_PATH)),
            settings,
        })
    }
}

fn required_path(value: Option<PathBuf>, name: &str) -> Result<PathBuf> {
    value
        .filter(|p| !p.as_os_str().is_empty())
        .ok_or_else(|| Error::ConfigInvalid {
            message: format!("{name} is not set"),
        })
}

/// Everything a pipeline run needs, built once at startup
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Input file
    pub raw_csv_path: PathBuf,
    /// Intermediate cleaned file
    pub processed_csv_path: PathBuf,
    /// Database URL; required only when loading
    pub db_url: Option<String>,
    /// Chart output directory
    pub plot_path: PathBuf,
    /// Pipeline settings
    pub settings: PipelineSettings,
}

impl PipelineConfig {
    /// Database URL, or [`Error::ConfigInvalid`] when unset
    pub fn db_url(&self) -> Result<&str> {
        self.db_url.as_deref().ok_or_else(|| Error::ConfigInvalid {
            message: "DB_URL is not set".to_string(),
        })
    }
}
