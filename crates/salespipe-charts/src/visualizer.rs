//! File-writing chart sink

use std::path::{Path, PathBuf};

use salespipe_core::{ChartSink, Table};

use crate::data::{self, HISTOGRAM_BINS, Histogram, KDE_POINTS};
use crate::error::{Error, Result};
use crate::svg::{ChartText, SvgRenderer};

/// File name of the sales-over-time chart
pub const SALES_OVER_TIME_FILE: &str = "sales_over_time.svg";
/// File name of the sales distribution chart
pub const SALES_DISTRIBUTION_FILE: &str = "sales_distribution.svg";
/// File name of the top products chart
pub const TOP_PRODUCTS_FILE: &str = "top_products.svg";

/// Writes the sales charts as SVG files into one directory
#[derive(Debug)]
pub struct SalesVisualizer {
    plot_dir: PathBuf,
    renderer: SvgRenderer,
}

impl SalesVisualizer {
    /// Create a visualizer writing into `plot_dir`, creating it if needed
    pub fn new(plot_dir: impl Into<PathBuf>) -> Result<Self> {
        let plot_dir = plot_dir.into();
        std::fs::create_dir_all(&plot_dir).map_err(|source| Error::Io {
            chart: "setup",
            path: plot_dir.clone(),
            source,
        })?;
        let renderer = SvgRenderer::new().map_err(|source| Error::Template {
            chart: "setup",
            source,
        })?;
        Ok(Self { plot_dir, renderer })
    }

    /// Output directory
    pub fn plot_dir(&self) -> &Path {
        &self.plot_dir
    }

    fn save(&self, chart: &'static str, file: &str, svg: String) -> Result<PathBuf> {
        let path = self.plot_dir.join(file);
        std::fs::write(&path, svg).map_err(|source| Error::Io {
            chart,
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }

    /// Line chart of total sales per date
    pub fn sales_over_time(&self, table: &Table, date_col: &str, sales_col: &str) -> Result<PathBuf> {
        const CHART: &str = "sales_over_time";
        let totals = data::sum_by_key(table, date_col, sales_col, CHART)?;
        if totals.is_empty() {
            tracing::warn!("No sales to plot over time; writing an empty chart");
        }
        let text = ChartText {
            name: CHART,
            title: "Sales Over Time".to_string(),
            x_label: "Date".to_string(),
            y_label: "Total Sales".to_string(),
        };
        let svg = self.renderer.line(&text, &totals)?;
        let path = self.save(CHART, SALES_OVER_TIME_FILE, svg)?;
        tracing::info!(dates = totals.len(), "Saved sales over time plot to {}", path.display());
        Ok(path)
    }

    /// Histogram of sale amounts with a density overlay
    pub fn sales_distribution(&self, table: &Table, sales_col: &str) -> Result<PathBuf> {
        const CHART: &str = "sales_distribution";
        let values = data::numeric_values(table, sales_col, CHART)?;
        if values.is_empty() {
            tracing::warn!("No sales amounts to plot; writing an empty distribution chart");
        }
        let histogram = Histogram::new(&values, HISTOGRAM_BINS);
        let curve = data::kde_curve(&values, &histogram, KDE_POINTS);
        if curve.is_empty() {
            tracing::debug!("Sales values have no spread; skipping density curve");
        }
        let text = ChartText {
            name: CHART,
            title: "Sales Distribution".to_string(),
            x_label: "Sales Amount".to_string(),
            y_label: "Frequency".to_string(),
        };
        let svg = self.renderer.histogram(&text, &histogram, &curve)?;
        let path = self.save(CHART, SALES_DISTRIBUTION_FILE, svg)?;
        tracing::info!(
            values = values.len(),
            "Saved sales distribution plot to {}",
            path.display()
        );
        Ok(path)
    }

    /// Horizontal bars of the `top_n` products by total sales
    pub fn top_products(
        &self,
        table: &Table,
        product_col: &str,
        sales_col: &str,
        top_n: usize,
    ) -> Result<PathBuf> {
        const CHART: &str = "top_products";
        let totals = data::sum_by_key(table, product_col, sales_col, CHART)?;
        let products = table
            .column(product_col)
            .map(data::distinct_count)
            .unwrap_or_default();
        if totals.is_empty() {
            tracing::warn!("No product sales to rank; writing an empty chart");
        }
        let top = data::top_n(totals, top_n);
        let text = ChartText {
            name: CHART,
            title: format!("Top {top_n} Products by Sales"),
            x_label: "Total Sales".to_string(),
            y_label: "Product".to_string(),
        };
        let svg = self.renderer.bars(&text, &top)?;
        let path = self.save(CHART, TOP_PRODUCTS_FILE, svg)?;
        tracing::info!(
            shown = top.len(),
            products,
            "Saved top products plot to {}",
            path.display()
        );
        Ok(path)
    }
}

impl ChartSink for SalesVisualizer {
    fn plot_sales_over_time(
        &self,
        table: &Table,
        date_col: &str,
        sales_col: &str,
    ) -> salespipe_core::Result<PathBuf> {
        Ok(self.sales_over_time(table, date_col, sales_col)?)
    }

    fn plot_sales_distribution(
        &self,
        table: &Table,
        sales_col: &str,
    ) -> salespipe_core::Result<PathBuf> {
        Ok(self.sales_distribution(table, sales_col)?)
    }

    fn plot_top_products(
        &self,
        table: &Table,
        product_col: &str,
        sales_col: &str,
        top_n: usize,
    ) -> salespipe_core::Result<PathBuf> {
        Ok(self.top_products(table, product_col, sales_col, top_n)?)
    }
}
