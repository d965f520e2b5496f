//! Persist-and-reload checkpoint
//!
//! The cleaned table is written to disk and read straight back before
//! validation. A SHA-256 digest taken at write time is checked on reload so
//! the validated table is exactly what was persisted. Columns that come back
//! without a single value take their type from the expected schema.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

use salespipe_core::extract::{apply_schema_hints, read_csv_from, write_csv};
use salespipe_core::{CsvOptions, Error, Result, Schema, Table};

/// A table persisted to disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Checkpoint {
    /// File the table was written to
    pub path: PathBuf,
    /// Hex SHA-256 of the file contents
    pub sha256: String,
    /// Rows written
    pub rows: usize,
}

impl Checkpoint {
    /// Write `table` to `path` and record its digest
    pub fn write(table: &Table, path: impl AsRef<Path>, options: &CsvOptions) -> Result<Self> {
        let path = path.as_ref();
        write_csv(table, path, options)?;
        let sha256 = digest(&std::fs::read(path)?);
        tracing::debug!(sha256 = %sha256, "Checkpoint written to {}", path.display());
        Ok(Self {
            path: path.to_path_buf(),
            sha256,
            rows: table.height(),
        })
    }

    /// Read the file back, verifying it has not changed
    pub fn reload(&self, options: &CsvOptions, expected: &Schema) -> Result<Table> {
        let bytes = std::fs::read(&self.path)?;
        let actual = digest(&bytes);
        if actual != self.sha256 {
            return Err(Error::ChecksumMismatch {
                path: self.path.display().to_string(),
                expected: self.sha256.clone(),
                actual,
            });
        }
        let table = apply_schema_hints(read_csv_from(bytes.as_slice(), options)?, expected)?;
        tracing::info!(
            rows = table.height(),
            "Processed data reloaded from {}",
            self.path.display()
        );
        Ok(table)
    }
}

fn digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}
