//! In-memory table
//!
//! A [`Table`] wraps a polars [`DataFrame`](pl::DataFrame). Column types are
//! reported as the pipeline's own [`DataType`], and single cells are read out
//! as [`Value`]s.

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime};
use polars::prelude as pl;
use polars::prelude::{AnyValue, NamedFrom, Series, TimeUnit};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Logical type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DataType {
    /// `true` / `false`
    Bool,
    /// 64-bit signed integer
    Int64,
    /// 64-bit float
    Float64,
    /// UTF-8 text
    Str,
    /// Calendar date without time
    Date,
    /// Date and time without timezone
    DateTime,
}

impl DataType {
    /// Canonical lowercase name
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int64 => "int64",
            Self::Float64 => "float64",
            Self::Str => "string",
            Self::Date => "date",
            Self::DateTime => "datetime",
        }
    }

    /// Whether values of this type can be summed and binned
    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Int64 | Self::Float64)
    }

    /// The polars type a column of this type is stored as
    pub fn to_polars(self) -> pl::DataType {
        match self {
            Self::Bool => pl::DataType::Boolean,
            Self::Int64 => pl::DataType::Int64,
            Self::Float64 => pl::DataType::Float64,
            Self::Str => pl::DataType::String,
            Self::Date => pl::DataType::Date,
            Self::DateTime => pl::DataType::Datetime(TimeUnit::Microseconds, None),
        }
    }

    /// Map a polars type onto the closest logical type.
    ///
    /// Every integer width reads as `int64`, both float widths as `float64`.
    /// Types the pipeline has no name for read as `string`.
    pub fn from_polars(dtype: &pl::DataType) -> Self {
        match dtype {
            pl::DataType::Boolean => Self::Bool,
            pl::DataType::Int8
            | pl::DataType::Int16
            | pl::DataType::Int32
            | pl::DataType::Int64
            | pl::DataType::UInt8
            | pl::DataType::UInt16
            | pl::DataType::UInt32
            | pl::DataType::UInt64 => Self::Int64,
            pl::DataType::Float32 | pl::DataType::Float64 => Self::Float64,
            pl::DataType::Date => Self::Date,
            pl::DataType::Datetime(_, _) => Self::DateTime,
            _ => Self::Str,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bool" | "boolean" => Ok(Self::Bool),
            "int64" | "int" | "integer" | "bigint" => Ok(Self::Int64),
            "float64" | "float" | "double" => Ok(Self::Float64),
            "string" | "str" | "text" | "object" => Ok(Self::Str),
            "date" => Ok(Self::Date),
            "datetime" | "datetime64[ns]" | "timestamp" => Ok(Self::DateTime),
            other => Err(Error::invalid_argument(format!(
                "unknown data type '{other}'"
            ))),
        }
    }
}

impl TryFrom<String> for DataType {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<DataType> for String {
    fn from(value: DataType) -> Self {
        value.as_str().to_string()
    }
}

/// A single cell
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Missing value
    Null,
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i64),
    /// Float
    Float(f64),
    /// Text
    Str(String),
    /// Date
    Date(NaiveDate),
    /// Timestamp without timezone
    DateTime(NaiveDateTime),
}

pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";
pub(crate) const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";
const DATETIME_FORMATS: &[&str] = &[DATETIME_FORMAT, "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"];

// Days from 0001-01-01 to 1970-01-01
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

impl Value {
    /// Whether this cell is missing
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Numeric view of the value
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            // Keep a trailing ".0" so integral floats read back as floats.
            Self::Float(x) if x.is_finite() && x.fract() == 0.0 && x.abs() < 1e15 => {
                write!(f, "{x:.1}")
            }
            Self::Float(x) => write!(f, "{x}"),
            Self::Str(s) => f.write_str(s),
            Self::Date(d) => write!(f, "{}", d.format(DATE_FORMAT)),
            Self::DateTime(dt) => write!(f, "{}", dt.format(DATETIME_FORMAT)),
        }
    }
}

impl From<AnyValue<'_>> for Value {
    fn from(value: AnyValue<'_>) -> Self {
        match value {
            AnyValue::Null => Self::Null,
            AnyValue::Boolean(b) => Self::Bool(b),
            AnyValue::Int8(v) => Self::Int(i64::from(v)),
            AnyValue::Int16(v) => Self::Int(i64::from(v)),
            AnyValue::Int32(v) => Self::Int(i64::from(v)),
            AnyValue::Int64(v) => Self::Int(v),
            AnyValue::UInt8(v) => Self::Int(i64::from(v)),
            AnyValue::UInt16(v) => Self::Int(i64::from(v)),
            AnyValue::UInt32(v) => Self::Int(i64::from(v)),
            AnyValue::UInt64(v) => i64::try_from(v).map_or(Self::Float(v as f64), Self::Int),
            AnyValue::Float32(v) => Self::Float(f64::from(v)),
            AnyValue::Float64(v) => Self::Float(v),
            AnyValue::String(s) => Self::Str(s.to_string()),
            AnyValue::StringOwned(s) => Self::Str(s.to_string()),
            AnyValue::Date(days) => date_from_days(days).map_or(Self::Null, Self::Date),
            AnyValue::Datetime(v, unit, _) => datetime_from(v, unit).map_or(Self::Null, Self::DateTime),
            AnyValue::DatetimeOwned(v, unit, _) => {
                datetime_from(v, unit).map_or(Self::Null, Self::DateTime)
            }
            other => Self::Str(other.to_string()),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

fn date_from_days(days: i32) -> Option<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(days.checked_add(UNIX_EPOCH_DAYS_FROM_CE)?)
}

pub(crate) fn days_since_epoch(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE
}

fn datetime_from(v: i64, unit: TimeUnit) -> Option<NaiveDateTime> {
    let dt = match unit {
        TimeUnit::Nanoseconds => Some(chrono::DateTime::from_timestamp_nanos(v)),
        TimeUnit::Microseconds => chrono::DateTime::from_timestamp_micros(v),
        TimeUnit::Milliseconds => chrono::DateTime::from_timestamp_millis(v),
    };
    dt.map(|dt| dt.naive_utc())
}

pub(crate) fn micros_since_epoch(dt: NaiveDateTime) -> i64 {
    dt.and_utc().timestamp_micros()
}

pub(crate) fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

pub(crate) fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT).ok()
}

pub(crate) fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| parse_date(s).map(|d| d.and_time(NaiveTime::MIN)))
}

/// Build a polars column of `dtype` from cells.
///
/// Nulls are allowed anywhere. A non-null cell that does not belong to
/// `dtype` is an [`Error::TableShape`]; integers are accepted in float
/// columns and anything renders into a string column.
pub fn column_from_values(name: &str, dtype: DataType, values: Vec<Value>) -> Result<pl::Column> {
    fn cells<T>(
        name: &str,
        dtype: DataType,
        values: Vec<Value>,
        pick: impl Fn(&Value) -> Option<T>,
    ) -> Result<Vec<Option<T>>> {
        values
            .iter()
            .map(|v| match (v, pick(v)) {
                (Value::Null, _) => Ok(None),
                (_, Some(cell)) => Ok(Some(cell)),
                (other, None) => Err(Error::table_shape(format!(
                    "column '{name}' holds {dtype} values, got '{other}'"
                ))),
            })
            .collect()
    }

    let label = pl::PlSmallStr::from(name);
    let series = match dtype {
        DataType::Bool => Series::new(
            label,
            cells(name, dtype, values, |v| match v {
                Value::Bool(b) => Some(*b),
                _ => None,
            })?,
        ),
        DataType::Int64 => Series::new(
            label,
            cells(name, dtype, values, |v| match v {
                Value::Int(i) => Some(*i),
                _ => None,
            })?,
        ),
        DataType::Float64 => Series::new(label, cells(name, dtype, values, Value::as_f64)?),
        DataType::Str => Series::new(
            label,
            cells(name, dtype, values, |v| Some(v.to_string()))?,
        ),
        DataType::Date => Series::new(
            label,
            cells(name, dtype, values, |v| match v {
                Value::Date(d) => Some(days_since_epoch(*d)),
                _ => None,
            })?,
        )
        .cast(&dtype.to_polars())?,
        DataType::DateTime => Series::new(
            label,
            cells(name, dtype, values, |v| match v {
                Value::DateTime(dt) => Some(micros_since_epoch(*dt)),
                _ => None,
            })?,
        )
        .cast(&dtype.to_polars())?,
    };
    Ok(series.into())
}

/// First value of a column that could not be converted
#[derive(Debug, Clone, PartialEq)]
pub struct CastFailure {
    /// Zero-based row index of the offending value
    pub row: usize,
    /// The offending value, rendered as text
    pub value: String,
    /// Why the conversion failed
    pub reason: String,
}

impl CastFailure {
    fn new(row: usize, value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            row,
            value: value.into(),
            reason: reason.into(),
        }
    }

    fn whole_column(err: pl::PolarsError) -> Self {
        Self::new(0, String::new(), err.to_string())
    }
}

/// A borrowed view of one column of a [`Table`]
#[derive(Debug, Clone, Copy)]
pub struct ColumnRef<'a> {
    inner: &'a pl::Column,
}

impl<'a> ColumnRef<'a> {
    /// Column name
    pub fn name(&self) -> &'a str {
        self.inner.name().as_str()
    }

    /// Logical type
    pub fn dtype(&self) -> DataType {
        DataType::from_polars(self.inner.dtype())
    }

    /// Number of cells
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether the column has no cells
    pub fn is_empty(&self) -> bool {
        self.inner.len() == 0
    }

    /// Cell at `row`; out-of-range rows read as null
    pub fn get(&self, row: usize) -> Value {
        self.inner.get(row).map_or(Value::Null, Value::from)
    }

    /// Every cell, in row order
    pub fn values(&self) -> Vec<Value> {
        (0..self.len()).map(|row| self.get(row)).collect()
    }

    /// Number of null cells
    pub fn null_count(&self) -> usize {
        self.inner.null_count()
    }

    /// Fraction of null cells; `0.0` for an empty column
    pub fn null_fraction(&self) -> f64 {
        if self.is_empty() {
            0.0
        } else {
            self.null_count() as f64 / self.len() as f64
        }
    }

    /// The underlying series
    pub fn series(&self) -> &'a Series {
        self.inner.as_materialized_series()
    }

    /// Convert every cell to `target`.
    ///
    /// Nulls stay null. Numeric targets use a strict polars cast, so a cell
    /// that would turn into null fails the whole column; floats with a
    /// fractional part do not convert to `int64`. Text converts to booleans,
    /// dates and timestamps by parsing each cell.
    pub fn cast(&self, target: DataType) -> std::result::Result<pl::Column, CastFailure> {
        let series = self.series();
        let polars_type = target.to_polars();
        if series.dtype() == &polars_type {
            return Ok(self.inner.clone());
        }
        let converted = match (self.dtype(), target) {
            (DataType::Str, DataType::Bool | DataType::Date | DataType::DateTime) => {
                parse_text(series, target)?
            }
            (DataType::Float64, DataType::Int64) => {
                ensure_integral(series)?;
                strict_cast(series, &polars_type)?
            }
            _ => strict_cast(series, &polars_type)?,
        };
        Ok(converted.into())
    }
}

fn strict_cast(series: &Series, target: &pl::DataType) -> std::result::Result<Series, CastFailure> {
    series
        .strict_cast(target)
        .map_err(|err| match series.cast(target) {
            Ok(lenient) => first_lost_cell(series, &lenient)
                .map(|row| {
                    let value = Value::from(series.get(row).unwrap_or(AnyValue::Null));
                    CastFailure::new(row, value.to_string(), format!("'{value}' is not a valid {target}"))
                })
                .unwrap_or_else(|| CastFailure::whole_column(err)),
            Err(_) => CastFailure::whole_column(err),
        })
}

// Row of the first cell that was present before a cast and null after it.
fn first_lost_cell(before: &Series, after: &Series) -> Option<usize> {
    let present = before.is_not_null();
    let missing = after.is_null();
    present
        .into_iter()
        .zip(missing.into_iter())
        .position(|(was, now)| was == Some(true) && now == Some(true))
}

fn ensure_integral(series: &Series) -> std::result::Result<(), CastFailure> {
    let floats = series
        .cast(&pl::DataType::Float64)
        .map_err(CastFailure::whole_column)?;
    let floats = floats.f64().map_err(CastFailure::whole_column)?;
    match floats
        .into_iter()
        .enumerate()
        .find_map(|(row, v)| v.filter(|f| f.fract() != 0.0).map(|f| (row, f)))
    {
        Some((row, f)) => Err(CastFailure::new(
            row,
            Value::Float(f).to_string(),
            format!("{f} is not an integral value"),
        )),
        None => Ok(()),
    }
}

fn parse_text(series: &Series, target: DataType) -> std::result::Result<Series, CastFailure> {
    fn each<T>(
        text: &pl::StringChunked,
        what: &str,
        parse: impl Fn(&str) -> Option<T>,
    ) -> std::result::Result<Vec<Option<T>>, CastFailure> {
        text.into_iter()
            .enumerate()
            .map(|(row, cell)| match cell {
                None => Ok(None),
                Some(s) => parse(s)
                    .map(Some)
                    .ok_or_else(|| CastFailure::new(row, s, format!("'{s}' is not a {what}"))),
            })
            .collect()
    }

    let text = series.str().map_err(CastFailure::whole_column)?;
    let name = series.name().clone();
    let parsed = match target {
        DataType::Bool => Series::new(name, each(text, "boolean", parse_bool)?),
        DataType::Date => Series::new(
            name,
            each(text, "date", |s| parse_date(s).map(days_since_epoch))?,
        ),
        DataType::DateTime => Series::new(
            name,
            each(text, "datetime", |s| parse_datetime(s).map(micros_since_epoch))?,
        ),
        other => return strict_cast(series, &other.to_polars()),
    };
    parsed
        .cast(&target.to_polars())
        .map_err(CastFailure::whole_column)
}

/// A table of named, equal-length columns
#[derive(Debug, Clone)]
pub struct Table {
    df: pl::DataFrame,
}

impl Table {
    /// Build a table, rejecting unequal lengths and duplicate names
    pub fn new(columns: Vec<pl::Column>) -> Result<Self> {
        pl::DataFrame::new(columns)
            .map(Self::from)
            .map_err(|e| Error::table_shape(e.to_string()))
    }

    /// A table with no columns and no rows
    pub fn empty() -> Self {
        Self::from(pl::DataFrame::empty())
    }

    /// Number of rows
    pub fn height(&self) -> usize {
        self.df.height()
    }

    /// Number of columns
    pub fn width(&self) -> usize {
        self.df.width()
    }

    /// Whether the table has no rows
    pub fn is_empty(&self) -> bool {
        self.height() == 0
    }

    /// Columns in order
    pub fn columns(&self) -> impl Iterator<Item = ColumnRef<'_>> + '_ {
        self.df.get_columns().iter().map(|inner| ColumnRef { inner })
    }

    /// Column names in order
    pub fn column_names(&self) -> Vec<&str> {
        self.df
            .get_column_names()
            .into_iter()
            .map(|name| name.as_str())
            .collect()
    }

    /// Column by name
    pub fn column(&self, name: &str) -> Option<ColumnRef<'_>> {
        self.df.column(name).ok().map(|inner| ColumnRef { inner })
    }

    /// Whether a column exists
    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Cells of one row, in column order
    pub fn row(&self, index: usize) -> Option<Vec<Value>> {
        (index < self.height()).then(|| self.columns().map(|c| c.get(index)).collect())
    }

    /// Total null cells
    pub fn null_count(&self) -> usize {
        self.columns().map(|c| c.null_count()).sum()
    }

    /// Replace the column of the same name
    pub fn replace_column(&mut self, column: pl::Column) -> Result<()> {
        if !self.has_column(column.name().as_str()) {
            return Err(Error::table_shape(format!(
                "no column named '{}'",
                column.name()
            )));
        }
        self.df.with_column(column)?;
        Ok(())
    }

    /// The underlying data frame
    pub fn frame(&self) -> &pl::DataFrame {
        &self.df
    }

    /// Take the data frame out of the table
    pub fn into_frame(self) -> pl::DataFrame {
        self.df
    }
}

impl From<pl::DataFrame> for Table {
    fn from(df: pl::DataFrame) -> Self {
        Self { df }
    }
}

impl PartialEq for Table {
    fn eq(&self, other: &Self) -> bool {
        self.df.equals_missing(&other.df)
    }
}
