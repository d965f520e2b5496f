//! Error types for salespipe-core

use thiserror::Error;

/// Result type alias for salespipe-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in salespipe-core
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file could not be found
    #[error("configuration file not found: {path}")]
    ConfigNotFound {
        /// Path that was searched
        path: String,
    },

    /// Failed to parse YAML configuration
    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_yaml::Error),

    /// Invalid or missing configuration value
    #[error("invalid configuration: {message}")]
    ConfigInvalid {
        /// Description of what's invalid
        message: String,
    },

    /// An argument outside the accepted set (strategy names, thresholds, ...)
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the rejected argument
        message: String,
    },

    /// Columns of unequal length or duplicate column names
    #[error("malformed table: {message}")]
    TableShape {
        /// Description of the shape problem
        message: String,
    },

    /// Required columns are missing from a table
    #[error("missing columns: {}", .missing.join(", "))]
    Schema {
        /// Names of the expected columns that were not found, sorted
        missing: Vec<String>,
    },

    /// Database could not be reached
    #[error("failed to connect to the database: {message}")]
    Connection {
        /// Driver error message
        message: String,
    },

    /// Database statement failed
    #[error("database error: {message}")]
    Database {
        /// Driver error message
        message: String,
    },

    /// Target table already exists and `if_exists` is `fail`
    #[error("table '{table}' already exists")]
    TableExists {
        /// Name of the existing table
        table: String,
    },

    /// Chart rendering failed
    #[error("chart '{chart}' error: {message}")]
    Chart {
        /// Name of the chart being rendered
        chart: String,
        /// Description of the error
        message: String,
    },

    /// A persisted file changed between writing and reading it back
    #[error("checksum mismatch for {path}: expected {expected}, found {actual}")]
    ChecksumMismatch {
        /// File that was re-read
        path: String,
        /// Digest recorded at write time
        expected: String,
        /// Digest of the bytes read back
        actual: String,
    },

    /// Data frame error from reading, writing or reshaping a table
    #[error("table error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Shorthand for an [`Error::InvalidArgument`]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Shorthand for an [`Error::TableShape`]
    pub fn table_shape(message: impl Into<String>) -> Self {
        Self::TableShape {
            message: message.into(),
        }
    }
}
