//! Salespipe Runtime
//!
//! This crate runs the sales ETL end to end.
//!
//! # Features
//!
//! - Stage-by-stage pipeline orchestration with per-run tracing spans
//! - Persist-and-reload checkpoint with digest verification
//! - PostgreSQL table store on sqlx
//!
//! # Usage
//!
//! ```rust,ignore
//! use salespipe_runtime::Pipeline;
//!
//! let mut pipeline = Pipeline::new(config);
//! let summary = pipeline.run().await?;
//! println!("loaded {} rows", summary.rows_loaded);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod checkpoint;
pub mod error;
pub mod pipeline;
pub mod postgres;

pub use checkpoint::Checkpoint;
pub use error::PipelineError;
pub use pipeline::{Pipeline, RunContext, RunSummary, Stage};
pub use postgres::PostgresStore;
