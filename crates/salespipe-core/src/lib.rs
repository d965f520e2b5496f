//! Salespipe Core Library
//!
//! This crate provides the pieces of the sales ETL that do not touch the
//! outside world beyond the local filesystem:
//! - A typed, columnar [`Table`] over a polars data frame
//! - Delimited file reading and writing with type inference
//! - The four cleaning transforms
//! - Schema and null-ratio validation
//! - Configuration and the sink traits implemented by other crates
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   Extract   │────▶│  Transform  │────▶│  Validate   │────▶│    Sinks    │
//! │    (CSV)    │     │ (4 steps)   │     │ (report)    │     │ (DB/charts) │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use salespipe_core::{CsvOptions, Schema, read_csv, transform};
//!
//! let table = read_csv("data/raw/sales.csv", &CsvOptions::default())?;
//! let table = transform::clean_names(table)?;
//! let (table, removed) = transform::dedup(table)?;
//! println!("removed {removed} duplicates");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod extract;
pub mod schema;
pub mod sinks;
pub mod table;
pub mod transform;
pub mod validate;

pub use config::{ConfigSources, PipelineConfig, PipelineSettings};
pub use error::{Error, Result};
pub use extract::{CsvOptions, apply_schema_hints, read_csv, write_csv};
pub use schema::Schema;
pub use sinks::{ChartSink, IfExists, TableStore};
pub use table::{ColumnRef, DataType, Table, Value, column_from_values};
pub use transform::{ConversionWarning, NullStrategy};
pub use validate::{ValidationReport, Validator};
