//! Query the target database

use anyhow::{Context, Result};
use salespipe_core::{Table, TableStore};
use salespipe_runtime::PostgresStore;

/// Run the query command
pub async fn run(db_url: Option<String>, sql: &str) -> Result<()> {
    let url = db_url
        .filter(|url| !url.trim().is_empty())
        .context("DB_URL is not set")?;

    let store = PostgresStore::connect(&url).await?;
    let result = store.read_query(sql).await;
    store.close().await;

    let table = result.context("Query failed")?;
    tracing::debug!(rows = table.height(), "Query returned");
    print!("{}", to_tsv(&table));
    Ok(())
}

/// Tab-separated rendering with a header line; nulls print as empty cells
fn to_tsv(table: &Table) -> String {
    let mut out = table.column_names().join("\t");
    out.push('\n');
    for row in 0..table.height() {
        let cells: Vec<String> = table
            .columns()
            .map(|column| escape(&column.get(row).to_string()))
            .collect();
        out.push_str(&cells.join("\t"));
        out.push('\n');
    }
    out
}

fn escape(cell: &str) -> String {
    cell.replace('\\', "\\\\")
        .replace('\t', "\\t")
        .replace('\n', "\\n")
}
