//! Salespipe Charts
//!
//! Renders the three descriptive sales charts as standalone SVG files.
//!
//! # Pipeline Overview
//!
//! ```text
//! ┌─────────┐     ┌───────────┐     ┌──────────┐     ┌─────────┐
//! │  Table  │────▶│ Aggregate │────▶│ Geometry │────▶│   SVG   │
//! │         │     │  (data)   │     │  (svg)   │     │ (file)  │
//! └─────────┘     └───────────┘     └──────────┘     └─────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use salespipe_charts::SalesVisualizer;
//! use salespipe_core::ChartSink;
//!
//! let viz = SalesVisualizer::new("plots")?;
//! viz.plot_top_products(&table, "coffee_name", "money", 10)?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod data;
pub mod error;
pub mod svg;
pub mod visualizer;

pub use error::{Error, Result};
pub use visualizer::SalesVisualizer;
