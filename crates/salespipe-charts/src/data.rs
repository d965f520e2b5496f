//! Chart data preparation
//!
//! Aggregations and statistics behind the three charts. Rows with a null in
//! any column a chart uses are skipped, as are sales cells that do not read
//! as numbers.

use std::collections::BTreeMap;

use polars::prelude as pl;
use salespipe_core::{ColumnRef, DataType, Table};

use crate::error::{Error, Result};

/// Number of histogram bins
pub const HISTOGRAM_BINS: usize = 30;

/// Number of points the density curve is evaluated at
pub const KDE_POINTS: usize = 100;

fn column<'a>(table: &'a Table, name: &str, chart: &'static str) -> Result<ColumnRef<'a>> {
    table.column(name).ok_or_else(|| Error::MissingColumn {
        chart,
        column: name.to_string(),
    })
}

/// Read a sales column as floats, one entry per row.
///
/// Integer, float and text columns are accepted. Text cells that do not
/// parse as numbers become `None` and are reported once per column.
fn amounts(table: &Table, name: &str, chart: &'static str) -> Result<Vec<Option<f64>>> {
    let col = column(table, name, chart)?;
    let non_numeric = || Error::NonNumeric {
        chart,
        column: name.to_string(),
        dtype: col.dtype().to_string(),
    };
    if !(col.dtype().is_numeric() || col.dtype() == DataType::Str) {
        return Err(non_numeric());
    }

    let floats = col
        .series()
        .cast(&pl::DataType::Float64)
        .map_err(|_| non_numeric())?;
    let values: Vec<Option<f64>> = floats
        .f64()
        .map_err(|_| non_numeric())?
        .into_iter()
        .map(|v| v.filter(|v| v.is_finite()))
        .collect();

    let present = col.len() - col.null_count();
    let skipped = present - values.iter().filter(|v| v.is_some()).count();
    if skipped > 0 {
        tracing::warn!(
            chart,
            "Skipped {} non-numeric values in column '{}'",
            skipped,
            name
        );
    }
    Ok(values)
}

/// Numeric values of a sales column, skipping nulls and unreadable cells
pub fn numeric_values(table: &Table, name: &str, chart: &'static str) -> Result<Vec<f64>> {
    Ok(amounts(table, name, chart)?.into_iter().flatten().collect())
}

/// Sum `value_col` per distinct `key_col`, as `(key, total)` pairs in key order
pub fn sum_by_key(
    table: &Table,
    key_col: &str,
    value_col: &str,
    chart: &'static str,
) -> Result<Vec<(String, f64)>> {
    let keys = column(table, key_col, chart)?
        .series()
        .cast(&pl::DataType::String)
        .map_err(|source| Error::Data { chart, source })?;
    let sales = amounts(table, value_col, chart)?;

    let mut totals: BTreeMap<String, f64> = BTreeMap::new();
    let keys = keys.str().map_err(|source| Error::Data { chart, source })?;
    for (key, amount) in keys.into_iter().zip(sales) {
        if let (Some(key), Some(amount)) = (key, amount) {
            *totals.entry(key.to_string()).or_default() += amount;
        }
    }
    Ok(totals.into_iter().collect())
}

/// Largest `n` totals, descending; ties ordered by name
pub fn top_n(totals: Vec<(String, f64)>, n: usize) -> Vec<(String, f64)> {
    let mut totals = totals;
    totals.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    totals.truncate(n);
    totals
}

/// Equal-width histogram
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    /// `bins + 1` bin edges, ascending
    pub edges: Vec<f64>,
    /// Count per bin
    pub counts: Vec<usize>,
}

impl Histogram {
    /// Bin `values` into `bins` equal-width bins over their range.
    ///
    /// The last bin is closed on the right. When all values are equal the
    /// range is widened by 0.5 on each side; with no values at all the bins
    /// cover `[0, 1]` and stay empty.
    pub fn new(values: &[f64], bins: usize) -> Self {
        let bins = bins.max(1);
        let (min, max) = bounds(values);
        let (lo, hi) = if values.is_empty() {
            (0.0, 1.0)
        } else if min == max {
            (min - 0.5, max + 0.5)
        } else {
            (min, max)
        };
        let width = (hi - lo) / bins as f64;
        let edges = (0..=bins).map(|i| lo + width * i as f64).collect();

        let mut counts = vec![0; bins];
        for v in values {
            let index = (((v - lo) / width).floor() as usize).min(bins - 1);
            counts[index] += 1;
        }
        Self { edges, counts }
    }

    /// Width of each bin
    pub fn bin_width(&self) -> f64 {
        match (self.edges.first(), self.edges.get(1)) {
            (Some(a), Some(b)) => b - a,
            _ => 0.0,
        }
    }

    /// Largest bin count
    pub fn max_count(&self) -> usize {
        self.counts.iter().copied().max().unwrap_or(0)
    }
}

fn bounds(values: &[f64]) -> (f64, f64) {
    values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(*v), hi.max(*v))
        })
}

/// Sample standard deviation (n - 1 denominator)
pub fn std_dev(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    var.sqrt()
}

/// Scott's rule of thumb for a Gaussian kernel
pub fn scott_bandwidth(sd: f64, n: f64) -> f64 {
    sd * n.powf(-0.2)
}

/// Gaussian kernel density estimate, scaled to histogram counts.
///
/// Bandwidth follows Scott's rule, `sd * n^(-1/5)`. The density is
/// multiplied by `n * bin_width` so the curve overlays a count histogram.
/// Evaluated at `points` evenly spaced positions over the histogram range.
/// Returns an empty curve when the values have no spread.
pub fn kde_curve(values: &[f64], histogram: &Histogram, points: usize) -> Vec<(f64, f64)> {
    let n = values.len() as f64;
    let sd = std_dev(values);
    if sd == 0.0 || points < 2 {
        return Vec::new();
    }
    let bandwidth = scott_bandwidth(sd, n);
    let scale = n * histogram.bin_width();
    let norm = 1.0 / (n * bandwidth * (2.0 * std::f64::consts::PI).sqrt());

    let (lo, hi) = match (histogram.edges.first(), histogram.edges.last()) {
        (Some(lo), Some(hi)) => (*lo, *hi),
        _ => return Vec::new(),
    };
    let step = (hi - lo) / (points - 1) as f64;

    (0..points)
        .map(|i| {
            let x = lo + step * i as f64;
            let density: f64 = values
                .iter()
                .map(|v| (-0.5 * ((x - v) / bandwidth).powi(2)).exp())
                .sum::<f64>()
                * norm;
            (x, density * scale)
        })
        .collect()
}

/// Count of distinct non-null values, used for logging
pub fn distinct_count(column: ColumnRef<'_>) -> usize {
    column.series().drop_nulls().n_unique().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::df;

    fn sales() -> Table {
        Table::from(
            df!(
                "date" => ["2024-03-02", "2024-03-01", "2024-03-02", "2024-03-01"],
                "money" => [Some(10.0), Some(5.0), None, Some(2.5)],
                "coffee_name" => ["Latte", "Mocha", "Latte", "Cortado"]
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_sum_by_date_sorted_and_summed() {
        let totals = sum_by_key(&sales(), "date", "money", "sales_over_time").unwrap();
        assert_eq!(
            totals,
            vec![
                ("2024-03-01".to_string(), 7.5),
                ("2024-03-02".to_string(), 10.0)
            ]
        );
    }

    #[test]
    fn test_missing_column() {
        let err = sum_by_key(&sales(), "day", "money", "sales_over_time").unwrap_err();
        assert!(matches!(err, Error::MissingColumn { ref column, .. } if column == "day"));
    }

    #[test]
    fn test_text_sales_column_skips_unreadable_cells() {
        let table = Table::from(
            df!(
                "date" => ["2024-03-01", "2024-03-01", "2024-03-02"],
                "money" => ["38.7", "bad", "28.9"]
            )
            .unwrap(),
        );
        assert_eq!(
            numeric_values(&table, "money", "sales_distribution").unwrap(),
            vec![38.7, 28.9]
        );
        let totals = sum_by_key(&table, "date", "money", "sales_over_time").unwrap();
        assert_eq!(
            totals,
            vec![
                ("2024-03-01".to_string(), 38.7),
                ("2024-03-02".to_string(), 28.9)
            ]
        );
    }

    #[test]
    fn test_date_sales_column_is_not_numeric() {
        let table = Table::from(df!("day" => ["2024-03-01"]).unwrap());
        let day = table.column("day").unwrap().cast(DataType::Date).unwrap();
        let table = Table::new(vec![day]).unwrap();
        let err = numeric_values(&table, "day", "sales_distribution").unwrap_err();
        assert!(matches!(err, Error::NonNumeric { .. }));
        assert_eq!(err.chart(), "sales_distribution");
    }

    #[test]
    fn test_all_null_gives_no_data() {
        let table = Table::from(df!("money" => [None::<f64>, None]).unwrap());
        assert!(numeric_values(&table, "money", "sales_distribution")
            .unwrap()
            .is_empty());
        let table = Table::from(
            df!("date" => [Some("2024-03-01"), None], "money" => [None, Some(1.0)]).unwrap(),
        );
        assert!(sum_by_key(&table, "date", "money", "sales_over_time")
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_top_n_orders_by_total_then_name() {
        let totals = vec![
            ("Americano".to_string(), 5.0),
            ("Cortado".to_string(), 7.0),
            ("Latte".to_string(), 9.0),
            ("Mocha".to_string(), 7.0),
        ];
        let top = top_n(totals, 3);
        let names: Vec<&str> = top.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["Latte", "Cortado", "Mocha"]);
    }

    #[test]
    fn test_top_n_larger_than_products() {
        let totals = sum_by_key(&sales(), "coffee_name", "money", "top_products").unwrap();
        assert_eq!(top_n(totals, 10).len(), 3);
    }

    #[test]
    fn test_histogram_counts_every_value() {
        let values: Vec<f64> = (0..100).map(f64::from).collect();
        let hist = Histogram::new(&values, HISTOGRAM_BINS);
        assert_eq!(hist.edges.len(), HISTOGRAM_BINS + 1);
        assert_eq!(hist.counts.iter().sum::<usize>(), 100);
        assert_eq!(hist.edges[0], 0.0);
        assert!((hist.edges[HISTOGRAM_BINS] - 99.0).abs() < 1e-9);
        assert!((hist.bin_width() - 3.3).abs() < 1e-9);
    }

    #[test]
    fn test_histogram_without_values() {
        let hist = Histogram::new(&[], HISTOGRAM_BINS);
        assert_eq!(hist.edges.first(), Some(&0.0));
        assert_eq!(hist.edges.last(), Some(&1.0));
        assert_eq!(hist.max_count(), 0);
    }

    #[test]
    fn test_histogram_single_value() {
        let hist = Histogram::new(&[4.0, 4.0, 4.0], 10);
        assert_eq!(hist.counts.iter().sum::<usize>(), 3);
        assert_eq!(hist.edges[0], 3.5);
        assert_eq!(hist.max_count(), 3);
    }

    #[test]
    fn test_std_dev() {
        assert!((std_dev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]) - 2.138_089_935).abs() < 1e-6);
        assert_eq!(std_dev(&[1.0]), 0.0);
    }

    #[test]
    fn test_kde_curve_area_matches_count() {
        let values: Vec<f64> = (0..200).map(|i| 20.0 + (i % 40) as f64 * 0.5).collect();
        let hist = Histogram::new(&values, HISTOGRAM_BINS);
        let curve = kde_curve(&values, &hist, KDE_POINTS);
        assert_eq!(curve.len(), KDE_POINTS);

        // Trapezoid area of the scaled curve is about n * bin_width, minus tails.
        let area: f64 = curve
            .windows(2)
            .map(|w| (w[1].0 - w[0].0) * (w[0].1 + w[1].1) / 2.0)
            .sum();
        let expected = values.len() as f64 * hist.bin_width();
        assert!(area > expected * 0.8 && area < expected * 1.01);
    }

    #[test]
    fn test_scott_bandwidth() {
        assert!((scott_bandwidth(2.0, 32.0) - 1.0).abs() < 1e-12);
        assert!((scott_bandwidth(1.0, 1.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_kde_curve_no_spread() {
        let values = [3.0, 3.0];
        let hist = Histogram::new(&values, 5);
        assert!(kde_curve(&values, &hist, KDE_POINTS).is_empty());
    }

    #[test]
    fn test_distinct_count() {
        let table = sales();
        assert_eq!(distinct_count(table.column("coffee_name").unwrap()), 3);
    }
}
