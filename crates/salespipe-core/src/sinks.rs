//! Sink traits
//!
//! The pipeline writes to two kinds of sinks: a relational [`TableStore`]
//! and a [`ChartSink`] that renders charts to files.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::table::Table;

/// What to do when the target table already exists
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IfExists {
    /// Drop and recreate the table
    #[default]
    Replace,
    /// Insert into the existing table, creating it if needed
    Append,
    /// Refuse to write
    Fail,
}

impl IfExists {
    /// Lowercase name
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Replace => "replace",
            Self::Append => "append",
            Self::Fail => "fail",
        }
    }
}

impl fmt::Display for IfExists {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IfExists {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "replace" => Ok(Self::Replace),
            "append" => Ok(Self::Append),
            "fail" => Ok(Self::Fail),
            other => Err(Error::invalid_argument(format!(
                "if_exists must be 'replace', 'append' or 'fail', got '{other}'"
            ))),
        }
    }
}

/// Relational table storage
#[async_trait]
pub trait TableStore: Send + Sync {
    /// Write `table` as `name`, returning the number of rows inserted
    async fn write_table(&self, table: &Table, name: &str, if_exists: IfExists) -> Result<u64>;

    /// Run a query and collect its result
    async fn read_query(&self, sql: &str) -> Result<Table>;

    /// Release any held connections
    async fn close(&self) {}
}

/// Renders the three sales charts
pub trait ChartSink {
    /// Line chart of summed sales per date
    fn plot_sales_over_time(&self, table: &Table, date_col: &str, sales_col: &str)
    -> Result<PathBuf>;

    /// Histogram of sale amounts with a density curve
    fn plot_sales_distribution(&self, table: &Table, sales_col: &str) -> Result<PathBuf>;

    /// Bar chart of the `top_n` products by summed sales
    fn plot_top_products(
        &self,
        table: &Table,
        product_col: &str,
        sales_col: &str,
        top_n: usize,
    ) -> Result<PathBuf>;
}
