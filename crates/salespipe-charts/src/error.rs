//! Error types for chart rendering

use std::path::PathBuf;
use thiserror::Error;

/// Result type for chart operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while rendering a chart
#[derive(Error, Debug)]
pub enum Error {
    /// A column the chart needs is not in the table
    #[error("column '{column}' not found")]
    MissingColumn {
        /// Chart being rendered
        chart: &'static str,
        /// Missing column
        column: String,
    },

    /// The value column is not numeric
    #[error("column '{column}' is {dtype}, expected a numeric column")]
    NonNumeric {
        /// Chart being rendered
        chart: &'static str,
        /// Offending column
        column: String,
        /// Its type name
        dtype: String,
    },

    /// A column could not be read for plotting
    #[error("data error: {source}")]
    Data {
        /// Chart being rendered
        chart: &'static str,
        /// Underlying error
        #[source]
        source: polars::prelude::PolarsError,
    },

    /// Template rendering failed
    #[error("template error: {source}")]
    Template {
        /// Chart being rendered
        chart: &'static str,
        /// Underlying error
        #[source]
        source: minijinja::Error,
    },

    /// Writing the chart file failed
    #[error("failed to write {}: {source}", .path.display())]
    Io {
        /// Chart being rendered
        chart: &'static str,
        /// Target path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Name of the chart the error belongs to
    pub fn chart(&self) -> &'static str {
        match self {
            Self::MissingColumn { chart, .. }
            | Self::NonNumeric { chart, .. }
            | Self::Data { chart, .. }
            | Self::Template { chart, .. }
            | Self::Io { chart, .. } => chart,
        }
    }
}

impl From<Error> for salespipe_core::Error {
    fn from(err: Error) -> Self {
        salespipe_core::Error::Chart {
            chart: err.chart().to_string(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_converts_to_core_chart_error() {
        let err = Error::MissingColumn {
            chart: "top_products",
            column: "coffee_name".to_string(),
        };
        let core: salespipe_core::Error = err.into();
        match core {
            salespipe_core::Error::Chart { chart, message } => {
                assert_eq!(chart, "top_products");
                assert_eq!(message, "column 'coffee_name' not found");
            }
            other => panic!("expected chart error, got {other:?}"),
        }
    }
}
