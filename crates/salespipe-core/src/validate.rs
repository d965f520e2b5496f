//! Schema and null-ratio checks
//!
//! The [`Validator`] inspects a table without changing it. Type mismatches
//! and columns above the null threshold are warnings; missing columns are a
//! hard [`Error::Schema`], which [`Validator::validate`] records in the
//! report instead of returning.

use serde::Serialize;
use std::fmt;

use crate::error::{Error, Result};
use crate::schema::Schema;
use crate::table::{DataType, Table};

/// Default maximum fraction of nulls per column
pub const DEFAULT_NULL_THRESHOLD: f64 = 0.1;

/// A column whose declared type differs from the expected one
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeMismatch {
    /// Column name
    pub column: String,
    /// Type the schema expects
    pub expected: DataType,
    /// Type the table has
    pub actual: DataType,
}

/// A column whose null fraction exceeds the threshold
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NullRatio {
    /// Column name
    pub column: String,
    /// Fraction of null cells, in `[0, 1]`
    pub fraction: f64,
}

/// Outcome of a validation pass
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    /// Columns present with an unexpected type
    pub type_mismatches: Vec<TypeMismatch>,
    /// Columns above the null threshold
    pub null_violations: Vec<NullRatio>,
    /// Expected columns that are absent, sorted
    pub missing_columns: Vec<String>,
    /// Message of the swallowed schema error, if any
    pub schema_error: Option<String>,
}

impl ValidationReport {
    /// Whether the schema check passed (warnings allowed)
    pub fn schema_ok(&self) -> bool {
        self.schema_error.is_none()
    }

    /// Whether there is nothing at all to report
    pub fn is_clean(&self) -> bool {
        self.schema_ok() && self.type_mismatches.is_empty() && self.null_violations.is_empty()
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema_error {
            Some(message) => writeln!(f, "schema: FAILED ({message})")?,
            None => writeln!(f, "schema: ok")?,
        }
        for m in &self.type_mismatches {
            writeln!(
                f,
                "  type mismatch: {} expected {}, found {}",
                m.column, m.expected, m.actual
            )?;
        }
        if self.null_violations.is_empty() {
            write!(f, "nulls: ok")
        } else {
            write!(f, "nulls: {} column(s) above threshold", self.null_violations.len())?;
            for v in &self.null_violations {
                write!(f, "\n  {}: {:.2}", v.column, v.fraction)?;
            }
            Ok(())
        }
    }
}

/// Checks tables against an expected schema and a null threshold
#[derive(Debug, Clone)]
pub struct Validator {
    expected: Schema,
    null_threshold: f64,
}

impl Validator {
    /// Create a validator; `null_threshold` must lie in `[0, 1]`
    pub fn new(expected: Schema, null_threshold: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&null_threshold) {
            return Err(Error::invalid_argument(format!(
                "null_threshold must be between 0 and 1, got {null_threshold}"
            )));
        }
        Ok(Self {
            expected,
            null_threshold,
        })
    }

    /// Validator with the default threshold
    pub fn with_default_threshold(expected: Schema) -> Self {
        Self {
            expected,
            null_threshold: DEFAULT_NULL_THRESHOLD,
        }
    }

    /// Expected schema
    pub fn expected(&self) -> &Schema {
        &self.expected
    }

    /// Null threshold
    pub fn null_threshold(&self) -> f64 {
        self.null_threshold
    }

    /// Check that every expected column exists.
    ///
    /// Missing columns are an [`Error::Schema`]. Columns present with a
    /// different type are logged and returned.
    pub fn validate_schema(&self, table: &Table) -> Result<Vec<TypeMismatch>> {
        let mut missing: Vec<String> = self
            .expected
            .names()
            .filter(|name| !table.has_column(name))
            .map(str::to_string)
            .collect();
        if !missing.is_empty() {
            missing.sort();
            return Err(Error::Schema { missing });
        }

        let mismatches: Vec<TypeMismatch> = self
            .expected
            .iter()
            .filter_map(|(name, expected)| {
                let actual = table.column(name)?.dtype();
                (actual != expected).then(|| TypeMismatch {
                    column: name.to_string(),
                    expected,
                    actual,
                })
            })
            .collect();

        for m in &mismatches {
            tracing::warn!(
                "Type mismatch for column {}: expected {}, got {}",
                m.column,
                m.expected,
                m.actual
            );
        }
        if mismatches.is_empty() {
            tracing::info!("Schema validation passed.");
        }
        Ok(mismatches)
    }

    /// Report columns whose null fraction is strictly above the threshold
    pub fn validate_nulls(&self, table: &Table) -> Vec<NullRatio> {
        let violations: Vec<NullRatio> = table
            .columns()
            .map(|c| NullRatio {
                column: c.name().to_string(),
                fraction: c.null_fraction(),
            })
            .filter(|r| r.fraction > self.null_threshold)
            .collect();

        if violations.is_empty() {
            tracing::info!("Null value validation passed.");
        } else {
            let listing = violations
                .iter()
                .map(|r| format!("{}: {:.2}", r.column, r.fraction))
                .collect::<Vec<_>>()
                .join(", ");
            tracing::warn!("Columns with high null values: {{{}}}", listing);
        }
        violations
    }

    /// Run both checks, recording a schema failure in the report.
    ///
    /// Never fails. When the schema check fails the null check is skipped.
    pub fn validate(&self, table: &Table) -> ValidationReport {
        let mut report = ValidationReport::default();
        match self.validate_schema(table) {
            Ok(mismatches) => {
                report.type_mismatches = mismatches;
                report.null_violations = self.validate_nulls(table);
            }
            Err(e) => {
                tracing::error!("Data validation failed: {}", e);
                if let Error::Schema { missing } = &e {
                    report.missing_columns = missing.clone();
                }
                report.schema_error = Some(e.to_string());
            }
        }
        report
    }

    /// Run both checks, returning a schema failure as an error
    pub fn validate_strict(&self, table: &Table) -> Result<ValidationReport> {
        let type_mismatches = self.validate_schema(table)?;
        let null_violations = self.validate_nulls(table);
        Ok(ValidationReport {
            type_mismatches,
            null_violations,
            ..Default::default()
        })
    }
}
