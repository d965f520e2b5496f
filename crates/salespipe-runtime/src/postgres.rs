//! PostgreSQL table store

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::query_builder::Separated;
use sqlx::{Column as _, Executor, Postgres, QueryBuilder, Row, Statement, TypeInfo};
use std::time::Duration;

use salespipe_core::{
    DataType, Error, IfExists, Result, Table, TableStore, Value, column_from_values,
};

/// PostgreSQL caps bind parameters per statement at 65535
const BIND_LIMIT: usize = 65_535;

/// Table store backed by a single-connection PostgreSQL pool
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

fn connection_error(e: sqlx::Error) -> Error {
    Error::Connection {
        message: e.to_string(),
    }
}

fn db_error(e: sqlx::Error) -> Error {
    Error::Database {
        message: e.to_string(),
    }
}

impl PostgresStore {
    /// Connect and verify the connection with `SELECT 1`
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(Duration::from_secs(10))
            .connect(url)
            .await
            .map_err(connection_error)?;
        sqlx::query("SELECT 1")
            .execute(&pool)
            .await
            .map_err(connection_error)?;
        tracing::info!("Database connection established.");
        Ok(Self { pool })
    }

    /// Wrap an existing pool
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Underlying pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn table_exists(conn: &mut sqlx::PgConnection, name: &str) -> Result<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM information_schema.tables \
             WHERE table_schema = current_schema() AND table_name = $1)",
        )
        .bind(name)
        .fetch_one(conn)
        .await
        .map_err(db_error)
    }
}

/// Double-quote an identifier, doubling embedded quotes
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// SQL column type for a table column type
pub fn sql_type(dtype: DataType) -> &'static str {
    match dtype {
        DataType::Bool => "BOOLEAN",
        DataType::Int64 => "BIGINT",
        DataType::Float64 => "DOUBLE PRECISION",
        DataType::Str => "TEXT",
        DataType::Date => "DATE",
        DataType::DateTime => "TIMESTAMP",
    }
}

fn create_table_sql(table: &Table, ident: &str, if_not_exists: bool) -> String {
    let columns = table
        .columns()
        .map(|c| format!("{} {}", quote_ident(c.name()), sql_type(c.dtype())))
        .collect::<Vec<_>>()
        .join(", ");
    let guard = if if_not_exists { "IF NOT EXISTS " } else { "" };
    format!("CREATE TABLE {guard}{ident} ({columns})")
}

/// Rows per INSERT so that `rows * width` stays within the bind limit
fn batch_rows(width: usize) -> usize {
    (BIND_LIMIT / width.max(1)).max(1)
}

fn push_cell(row: &mut Separated<'_, '_, Postgres, &'static str>, value: &Value, dtype: DataType) {
    match dtype {
        DataType::Bool => {
            row.push_bind(match value {
                Value::Bool(b) => Some(*b),
                _ => None,
            });
        }
        DataType::Int64 => {
            row.push_bind(match value {
                Value::Int(i) => Some(*i),
                _ => None,
            });
        }
        DataType::Float64 => {
            row.push_bind(value.as_f64());
        }
        DataType::Str => {
            row.push_bind((!value.is_null()).then(|| value.to_string()));
        }
        DataType::Date => {
            row.push_bind(match value {
                Value::Date(d) => Some(*d),
                _ => None,
            });
        }
        DataType::DateTime => {
            row.push_bind(match value {
                Value::DateTime(dt) => Some(*dt),
                _ => None,
            });
        }
    }
}

/// How a result column is decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Decode {
    Int2,
    Int4,
    Int8,
    Float4,
    Float8,
    Text,
    Bool,
    Date,
    Timestamp,
    TimestampTz,
}

impl Decode {
    fn for_type(name: &str) -> Option<Self> {
        Some(match name {
            "INT2" => Self::Int2,
            "INT4" => Self::Int4,
            "INT8" => Self::Int8,
            "FLOAT4" => Self::Float4,
            "FLOAT8" => Self::Float8,
            "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => Self::Text,
            "BOOL" => Self::Bool,
            "DATE" => Self::Date,
            "TIMESTAMP" => Self::Timestamp,
            "TIMESTAMPTZ" => Self::TimestampTz,
            _ => return None,
        })
    }

    fn data_type(self) -> DataType {
        match self {
            Self::Int2 | Self::Int4 | Self::Int8 => DataType::Int64,
            Self::Float4 | Self::Float8 => DataType::Float64,
            Self::Text => DataType::Str,
            Self::Bool => DataType::Bool,
            Self::Date => DataType::Date,
            Self::Timestamp | Self::TimestampTz => DataType::DateTime,
        }
    }

    fn value(self, row: &PgRow, index: usize) -> std::result::Result<Value, sqlx::Error> {
        Ok(match self {
            Self::Int2 => row.try_get::<Option<i16>, _>(index)?.map(i64::from).into(),
            Self::Int4 => row.try_get::<Option<i32>, _>(index)?.map(i64::from).into(),
            Self::Int8 => row.try_get::<Option<i64>, _>(index)?.into(),
            Self::Float4 => row.try_get::<Option<f32>, _>(index)?.map(f64::from).into(),
            Self::Float8 => row.try_get::<Option<f64>, _>(index)?.into(),
            Self::Text => row.try_get::<Option<String>, _>(index)?.into(),
            Self::Bool => row.try_get::<Option<bool>, _>(index)?.into(),
            Self::Date => row
                .try_get::<Option<NaiveDate>, _>(index)?
                .map_or(Value::Null, Value::Date),
            Self::Timestamp => row
                .try_get::<Option<NaiveDateTime>, _>(index)?
                .map_or(Value::Null, Value::DateTime),
            Self::TimestampTz => row
                .try_get::<Option<DateTime<Utc>>, _>(index)?
                .map_or(Value::Null, |dt| Value::DateTime(dt.naive_utc())),
        })
    }
}

#[async_trait]
impl TableStore for PostgresStore {
    async fn write_table(&self, table: &Table, name: &str, if_exists: IfExists) -> Result<u64> {
        let ident = quote_ident(name);
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        let exists = Self::table_exists(&mut tx, name).await?;
        match (if_exists, exists) {
            (IfExists::Fail, true) => {
                return Err(Error::TableExists {
                    table: name.to_string(),
                });
            }
            (IfExists::Replace, true) => {
                let drop = format!("DROP TABLE {ident}");
                sqlx::query(&drop)
                    .execute(&mut *tx)
                    .await
                    .map_err(db_error)?;
                tracing::debug!("Dropped existing table {}", name);
            }
            _ => {}
        }

        let create = create_table_sql(table, &ident, if_exists == IfExists::Append);
        sqlx::query(&create)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;

        let mut inserted = 0;
        if table.width() > 0 {
            let column_list = table
                .column_names()
                .into_iter()
                .map(quote_ident)
                .collect::<Vec<_>>()
                .join(", ");
            let batch = batch_rows(table.width());
            let mut start = 0;
            while start < table.height() {
                let end = (start + batch).min(table.height());
                let mut query: QueryBuilder<Postgres> =
                    QueryBuilder::new(format!("INSERT INTO {ident} ({column_list}) "));
                query.push_values(start..end, |mut row, index| {
                    for column in table.columns() {
                        push_cell(&mut row, &column.get(index), column.dtype());
                    }
                });
                let result = query.build().execute(&mut *tx).await.map_err(db_error)?;
                inserted += result.rows_affected();
                start = end;
            }
        }

        tx.commit().await.map_err(db_error)?;
        tracing::info!(
            rows = inserted,
            if_exists = %if_exists,
            "Data loaded into table {}",
            name
        );
        Ok(inserted)
    }

    async fn read_query(&self, sql: &str) -> Result<Table> {
        let mut conn = self.pool.acquire().await.map_err(db_error)?;
        let statement = (&mut *conn).prepare(sql).await.map_err(db_error)?;

        let mut names: Vec<String> = Vec::new();
        let mut decoders = Vec::new();
        for column in statement.columns() {
            let type_name = column.type_info().name();
            let decode = Decode::for_type(type_name).ok_or_else(|| Error::Database {
                message: format!(
                    "column '{}' has unsupported type {}; cast it to a supported type",
                    column.name(),
                    type_name
                ),
            })?;
            let mut name = column.name().to_string();
            let mut n = 1;
            while names.contains(&name) {
                name = format!("{}_{}", column.name(), n);
                n += 1;
            }
            names.push(name);
            decoders.push(decode);
        }

        let rows = statement
            .query()
            .fetch_all(&mut *conn)
            .await
            .map_err(db_error)?;

        let mut cells: Vec<Vec<Value>> = vec![Vec::with_capacity(rows.len()); decoders.len()];
        for row in &rows {
            for (index, decode) in decoders.iter().enumerate() {
                cells[index].push(decode.value(row, index).map_err(db_error)?);
            }
        }

        let columns = names
            .into_iter()
            .zip(decoders)
            .zip(cells)
            .map(|((name, decode), values)| column_from_values(&name, decode.data_type(), values))
            .collect::<Result<Vec<_>>>()?;
        Table::new(columns)
    }

    async fn close(&self) {
        self.pool.close().await;
        tracing::debug!("Database connection closed.");
    }
}
