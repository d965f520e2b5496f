//! Delimited file reading and writing
//!
//! Files go through the polars CSV reader and writer. The header row defines
//! column names. Column types are inferred from every row: integers become
//! `int64`, numbers `float64`, `true`/`false` `bool`, anything else
//! `string`. Dates are not inferred and round-trip as text.

use polars::prelude::{
    CsvReadOptions, CsvWriter, NullValues, PlSmallStr, SerReader, SerWriter, Series,
};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Cursor, Read, Write};
use std::path::Path;

use crate::error::Result;
use crate::schema::Schema;
use crate::table::{DATETIME_FORMAT, DataType, Table};

/// Cells that read as null, besides empty fields
const NULL_TOKENS: &[&str] = &["NA", "N/A", "NaN", "nan", "null", "NULL"];

/// Options shared by the reader and the writer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsvOptions {
    /// Field delimiter
    #[serde(default = "default_delimiter", with = "delimiter_char")]
    pub delimiter: u8,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: default_delimiter(),
        }
    }
}

fn default_delimiter() -> u8 {
    b','
}

mod delimiter_char {
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(value: &u8, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_char(char::from(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
        let c = char::deserialize(deserializer)?;
        u8::try_from(c).map_err(|_| D::Error::custom(format!("delimiter '{c}' is not ASCII")))
    }
}

/// Load a delimited file into a [`Table`]
pub fn read_csv(path: impl AsRef<Path>, options: &CsvOptions) -> Result<Table> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).inspect_err(|e| {
        tracing::error!("Failed to load CSV file from {}: {}", path.display(), e);
    })?;
    let table = read_csv_bytes(bytes, options)?;
    tracing::info!(
        rows = table.height(),
        columns = table.width(),
        "CSV file loaded successfully from {}",
        path.display()
    );
    Ok(table)
}

/// Read delimited text from any reader
pub fn read_csv_from<R: Read>(mut reader: R, options: &CsvOptions) -> Result<Table> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    read_csv_bytes(bytes, options)
}

fn read_csv_bytes(bytes: Vec<u8>, options: &CsvOptions) -> Result<Table> {
    let null_values: Vec<PlSmallStr> = NULL_TOKENS.iter().map(|&token| token.into()).collect();
    // Inference scans every row so a stray value late in the file turns the
    // column into text instead of failing the parse.
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(None)
        .map_parse_options(|parse| {
            parse
                .with_separator(options.delimiter)
                .with_null_values(Some(NullValues::AllColumns(null_values.clone())))
        })
        .into_reader_with_file_handle(Cursor::new(bytes))
        .finish()?;
    Ok(Table::from(df))
}

/// Give columns without a single value the type `schema` expects.
///
/// A file with no rows, or a column that is empty in every row, carries no
/// type information and reads back as `string`. Columns holding at least
/// one value keep their inferred type.
pub fn apply_schema_hints(table: Table, schema: &Schema) -> Result<Table> {
    let mut df = table.into_frame();
    for (name, expected) in schema.iter() {
        let Ok(column) = df.column(name) else {
            continue;
        };
        if column.null_count() < column.len() || DataType::from_polars(column.dtype()) == expected {
            continue;
        }
        let typed = Series::full_null(column.name().clone(), column.len(), &expected.to_polars());
        df.with_column(typed)?;
        tracing::debug!("Column {} has no values; typed as {}", name, expected);
    }
    Ok(Table::from(df))
}

/// Write a [`Table`] as a delimited file, creating parent directories
pub fn write_csv(table: &Table, path: impl AsRef<Path>, options: &CsvOptions) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(path)?;
    write_csv_to(table, file, options)?;
    tracing::info!(rows = table.height(), "Table written to {}", path.display());
    Ok(())
}

/// Write delimited text to any writer
pub fn write_csv_to<W: Write>(table: &Table, writer: W, options: &CsvOptions) -> Result<()> {
    let mut df = table.frame().clone();
    CsvWriter::new(writer)
        .include_header(true)
        .with_separator(options.delimiter)
        .with_datetime_format(Some(DATETIME_FORMAT.to_string()))
        .finish(&mut df)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Value;

    const SALES: &str = "\
date,datetime,cash_type,card,money,coffee_name
2024-03-01,2024-03-01 10:15:50.520,card,ANON-0000-0000-0001,38.7,Latte
2024-03-01,2024-03-01 12:19:22.539,card,ANON-0000-0000-0002,38.7,Hot Chocolate
2024-03-02,2024-03-02 10:22:11.000,cash,,40,Americano
";

    fn read(text: &str) -> Table {
        read_csv_from(text.as_bytes(), &CsvOptions::default()).unwrap()
    }

    #[test]
    fn test_read_infers_types() {
        let table = read(SALES);
        assert_eq!(table.height(), 3);
        assert_eq!(table.column("money").unwrap().dtype(), DataType::Float64);
        assert_eq!(table.column("date").unwrap().dtype(), DataType::Str);
        assert_eq!(table.column("datetime").unwrap().dtype(), DataType::Str);
        assert_eq!(table.column("money").unwrap().get(2), Value::Float(40.0));
    }

    #[test]
    fn test_read_empty_fields_are_null() {
        let table = read(SALES);
        let card = table.column("card").unwrap();
        assert_eq!(card.null_count(), 1);
        assert!(card.get(2).is_null());
    }

    #[test]
    fn test_read_integer_column() {
        let table = read("id,qty\n1,10\n2,NA\n3,30\n");
        let qty = table.column("qty").unwrap();
        assert_eq!(qty.dtype(), DataType::Int64);
        assert_eq!(qty.values(), vec![Value::Int(10), Value::Null, Value::Int(30)]);
    }

    #[test]
    fn test_read_infers_booleans() {
        let table = read("paid,label\ntrue,x\nfalse,y\n,z\n");
        let paid = table.column("paid").unwrap();
        assert_eq!(paid.dtype(), DataType::Bool);
        assert_eq!(
            paid.values(),
            vec![Value::Bool(true), Value::Bool(false), Value::Null]
        );
    }

    #[test]
    fn test_read_mixed_column_is_text() {
        let table = read("money\n38.7\nbad\n");
        let money = table.column("money").unwrap();
        assert_eq!(money.dtype(), DataType::Str);
        assert_eq!(money.values(), vec![Value::from("38.7"), Value::from("bad")]);
    }

    #[test]
    fn test_read_keeps_raw_header_text() {
        let table = read(" Date ,Cash_Type,Money\n2024-03-01,card,1.5\n");
        assert_eq!(table.column_names(), vec![" Date ", "Cash_Type", "Money"]);
    }

    #[test]
    fn test_read_keeps_repeated_headers_addressable() {
        let table = read("a,a,b,a\n1,2,3,4\n");
        let names = table.column_names();
        assert_eq!(names.len(), 4);
        assert_eq!(names[0], "a");
        assert_eq!(names[2], "b");
        let mut distinct = names.clone();
        distinct.sort_unstable();
        distinct.dedup();
        assert_eq!(distinct.len(), 4);
    }

    #[test]
    fn test_read_rejects_rows_with_extra_fields() {
        let result = read_csv_from("a,b\n1,2\n3,4,5\n".as_bytes(), &CsvOptions::default());
        assert!(matches!(result, Err(crate::Error::Polars(_))));
    }

    #[test]
    fn test_read_with_semicolon_delimiter() {
        let options = CsvOptions { delimiter: b';' };
        let table = read_csv_from("a;b\n1;x\n".as_bytes(), &options).unwrap();
        assert_eq!(table.column_names(), vec!["a", "b"]);
    }

    #[test]
    fn test_write_then_read_preserves_float_type() {
        let table = read("money\n1.0\n2.0\n");
        assert_eq!(table.column("money").unwrap().dtype(), DataType::Float64);

        let mut out = Vec::new();
        write_csv_to(&table, &mut out, &CsvOptions::default()).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "money\n1.0\n2.0\n");

        let again = read(&text);
        assert_eq!(again, table);
    }

    #[test]
    fn test_write_csv_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("processed/sales.csv");
        let table = read(SALES);

        write_csv(&table, &path, &CsvOptions::default()).unwrap();
        let reloaded = read_csv(&path, &CsvOptions::default()).unwrap();
        assert_eq!(reloaded, table);
    }

    #[test]
    fn test_header_only_file_takes_schema_types() {
        let table = read("date,money,card,extra\n");
        assert_eq!(table.height(), 0);
        assert_eq!(table.column("money").unwrap().dtype(), DataType::Str);

        let hinted = apply_schema_hints(table, &Schema::coffee_sales()).unwrap();
        assert_eq!(hinted.column("money").unwrap().dtype(), DataType::Float64);
        assert_eq!(hinted.column("date").unwrap().dtype(), DataType::Str);
        assert_eq!(hinted.column("extra").unwrap().dtype(), DataType::Str);
        assert_eq!(hinted.column_names(), vec!["date", "money", "card", "extra"]);
    }

    #[test]
    fn test_schema_hints_leave_populated_columns_alone() {
        let table = read("money,card\nbad,\n");
        let hinted = apply_schema_hints(table, &Schema::coffee_sales()).unwrap();
        assert_eq!(hinted.column("money").unwrap().dtype(), DataType::Str);
        assert_eq!(hinted.column("card").unwrap().dtype(), DataType::Str);
        assert!(hinted.column("card").unwrap().get(0).is_null());
    }

    #[test]
    fn test_read_missing_file() {
        let result = read_csv("/definitely/not/here.csv", &CsvOptions::default());
        assert!(matches!(result, Err(crate::Error::Io(_))));
    }

    #[test]
    fn test_parse_delimiter_option() {
        let options: CsvOptions = serde_yaml::from_str("delimiter: \";\"\n").unwrap();
        assert_eq!(options.delimiter, b';');
        let options: CsvOptions = serde_yaml::from_str("{}").unwrap();
        assert_eq!(options.delimiter, b',');
    }
}
