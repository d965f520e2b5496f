//! Table transforms
//!
//! Four table-to-table operations, applied in this order by the pipeline:
//!
//! 1. [`clean_names`] - normalize column names
//! 2. [`dedup`] - drop repeated rows
//! 3. [`handle_nulls`] - drop or fill missing cells
//! 4. [`coerce_types`] - best-effort conversion to the expected schema
//!
//! Each takes ownership of its input and returns a new table.

use once_cell::sync::Lazy;
use polars::prelude as pl;
use polars::prelude::{Expr, IntoLazy, UniqueKeepStrategy, col, lit};
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::schema::Schema;
use crate::table::{
    ColumnRef, DataType, Table, days_since_epoch, micros_since_epoch, parse_bool, parse_date,
    parse_datetime,
};

static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9_]").expect("valid regex"));

/// Normalize a single column name: trim, lowercase, spaces to underscores,
/// then drop anything outside `[A-Za-z0-9_]`.
pub fn clean_name(name: &str) -> String {
    let lowered = name.trim().to_lowercase().replace(' ', "_");
    NON_WORD.replace_all(&lowered, "").into_owned()
}

/// Standardize column names.
///
/// Names that collide after normalization keep the first occurrence as is;
/// later ones get `_1`, `_2`, ... appended.
pub fn clean_names(table: Table) -> Result<Table> {
    let mut taken: HashSet<String> = HashSet::new();
    let columns = table
        .into_frame()
        .take_columns()
        .into_iter()
        .map(|column| {
            let original = column.name().to_string();
            let base = clean_name(&original);
            let mut name = base.clone();
            let mut n = 1;
            while taken.contains(&name) {
                name = format!("{base}_{n}");
                n += 1;
            }
            if name != base {
                tracing::warn!(
                    "Column '{}' normalizes to '{}', which is taken; renamed to '{}'",
                    original,
                    base,
                    name
                );
            }
            taken.insert(name.clone());
            column.with_name(name.into())
        })
        .collect();
    let table = Table::new(columns)?;
    tracing::info!("Column names cleaned and standardized.");
    Ok(table)
}

/// Remove rows identical to an earlier row, keeping the first occurrence.
///
/// Nulls compare equal to each other. Returns the surviving table and the
/// number of rows removed.
pub fn dedup(table: Table) -> Result<(Table, usize)> {
    let before = table.height();
    let deduped = table
        .into_frame()
        .lazy()
        .unique_stable(None, UniqueKeepStrategy::First)
        .collect()?;
    let removed = before - deduped.height();
    tracing::info!("Removed {} duplicate rows.", removed);
    Ok((Table::from(deduped), removed))
}

/// What to do with null cells
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum NullStrategy {
    /// Remove every row containing a null
    #[default]
    Drop,
    /// Replace every null with this value (converted to the column type
    /// when possible)
    Fill(String),
}

impl NullStrategy {
    /// Build a strategy from its name and optional fill value.
    ///
    /// Only `drop` and `fill` are accepted; `fill` needs a value.
    pub fn parse(name: &str, fill_value: Option<&str>) -> Result<Self> {
        match name {
            "drop" => Ok(Self::Drop),
            "fill" => fill_value
                .map(|v| Self::Fill(v.to_string()))
                .ok_or_else(|| Error::invalid_argument("strategy 'fill' requires a fill_value")),
            other => Err(Error::invalid_argument(format!(
                "strategy must be 'drop' or 'fill', got '{other}'"
            ))),
        }
    }
}

impl FromStr for NullStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.split_once(':') {
            Some(("fill", value)) => Self::parse("fill", Some(value)),
            _ => Self::parse(s, None),
        }
    }
}

impl fmt::Display for NullStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Drop => f.write_str("drop"),
            Self::Fill(value) => write!(f, "fill:{value}"),
        }
    }
}

/// Drop or fill null cells.
///
/// With [`NullStrategy::Fill`], the fill value is converted to each column's
/// type. A column whose type cannot hold the fill value is turned into a
/// `string` column first, so every filled cell equals the fill text.
pub fn handle_nulls(table: Table, strategy: &NullStrategy) -> Result<Table> {
    let nulls_before = table.null_count();

    match strategy {
        NullStrategy::Drop => {
            let df = table.into_frame().lazy().drop_nulls(None).collect()?;
            tracing::info!(
                "Dropped rows with missing values. ({} nulls removed)",
                nulls_before
            );
            Ok(Table::from(df))
        }
        NullStrategy::Fill(fill) => {
            let fills: Vec<Expr> = table
                .columns()
                .filter(|column| column.null_count() > 0)
                .map(|column| fill_expr(column, fill))
                .collect();
            let table = if fills.is_empty() {
                table
            } else {
                Table::from(table.into_frame().lazy().with_columns(fills).collect()?)
            };
            tracing::info!("Filled {} missing values with '{}'.", nulls_before, fill);
            Ok(table)
        }
    }
}

fn fill_expr(column: ColumnRef<'_>, fill: &str) -> Expr {
    let name = column.name();
    let typed = match column.dtype() {
        DataType::Str => Some(lit(fill)),
        DataType::Int64 => fill.trim().parse::<i64>().ok().map(lit),
        DataType::Float64 => fill.trim().parse::<f64>().ok().map(lit),
        DataType::Bool => parse_bool(fill).map(lit),
        DataType::Date => parse_date(fill)
            .map(|d| lit(days_since_epoch(d)).cast(DataType::Date.to_polars())),
        DataType::DateTime => parse_datetime(fill)
            .map(|dt| lit(micros_since_epoch(dt)).cast(DataType::DateTime.to_polars())),
    };
    match typed {
        Some(value) => col(name).fill_null(value),
        None => {
            tracing::debug!(
                "Fill value '{}' does not fit {} column '{}'; storing it as text",
                fill,
                column.dtype(),
                name
            );
            col(name).cast(pl::DataType::String).fill_null(lit(fill))
        }
    }
}

/// A column that could not be converted to its expected type
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversionWarning {
    /// Column name
    pub column: String,
    /// Type the schema asked for
    pub target: DataType,
    /// Type the column kept
    pub kept: DataType,
    /// First value that failed, as text
    pub value: String,
    /// Why it failed
    pub reason: String,
}

impl fmt::Display for ConversionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Failed to convert {} to {}: {} (kept {})",
            self.column, self.target, self.reason, self.kept
        )
    }
}

/// Convert columns to the types in `schema`, one column at a time.
///
/// A column whose values cannot all be converted is left exactly as it was
/// and reported in the returned warnings. Columns not in the schema are
/// untouched; schema entries with no matching column are skipped. Never
/// fails.
pub fn coerce_types(mut table: Table, schema: &Schema) -> (Table, Vec<ConversionWarning>) {
    let mut warnings = Vec::new();

    for (name, target) in schema.iter() {
        let Some(column) = table.column(name) else {
            continue;
        };
        let kept = column.dtype();
        match column.cast(target) {
            Ok(converted) => {
                // Same name and length, so replacement cannot fail.
                if table.replace_column(converted).is_ok() {
                    tracing::info!("Converted {} to {}", name, target);
                }
            }
            Err(failure) => {
                let warning = ConversionWarning {
                    column: name.to_string(),
                    target,
                    kept,
                    value: failure.value,
                    reason: failure.reason,
                };
                tracing::warn!("{}", warning);
                warnings.push(warning);
            }
        }
    }

    (table, warnings)
}
