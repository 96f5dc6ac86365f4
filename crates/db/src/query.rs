use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Executor, Row, TypeInfo, ValueRef};

use crate::DbPool;

/// Result of a read query with every cell rendered as display text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOutput {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl QueryOutput {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// Execute a read query and stringify the result grid. Callers are expected
/// to have validated the statement; this function only reports execution
/// failures.
pub async fn run_select(pool: &DbPool, query: &str) -> Result<QueryOutput, sqlx::Error> {
    let rows = sqlx::query(query).fetch_all(pool).await?;
    if rows.is_empty() {
        // Empty results still need headers; recover them from the prepared
        // statement metadata.
        let describe = pool.describe(query).await?;
        let columns = describe.columns().iter().map(|col| col.name().to_string()).collect();
        return Ok(QueryOutput { columns, rows: Vec::new() });
    }
    Ok(stringify_rows(&rows))
}

/// Fetch the first `limit` rows of a table. The table name is interpolated,
/// not bound; callers allow-list it first.
pub async fn fetch_sample(
    pool: &DbPool,
    table: &str,
    limit: i64,
) -> Result<QueryOutput, sqlx::Error> {
    run_select_with_limit(pool, &format!("SELECT * FROM {table} LIMIT ?1"), limit).await
}

async fn run_select_with_limit(
    pool: &DbPool,
    query: &str,
    limit: i64,
) -> Result<QueryOutput, sqlx::Error> {
    let rows = sqlx::query(query).bind(limit).fetch_all(pool).await?;
    if rows.is_empty() {
        let describe = pool.describe(query).await?;
        let columns = describe.columns().iter().map(|col| col.name().to_string()).collect();
        return Ok(QueryOutput { columns, rows: Vec::new() });
    }
    Ok(stringify_rows(&rows))
}

fn stringify_rows(rows: &[SqliteRow]) -> QueryOutput {
    let columns: Vec<String> =
        rows[0].columns().iter().map(|col| col.name().to_string()).collect();
    let rows = rows
        .iter()
        .map(|row| (0..columns.len()).map(|index| stringify_cell(row, index)).collect())
        .collect();
    QueryOutput { columns, rows }
}

fn stringify_cell(row: &SqliteRow, index: usize) -> String {
    let Ok(value) = row.try_get_raw(index) else {
        return "NULL".to_string();
    };
    if value.is_null() {
        return "NULL".to_string();
    }
    let rendered = match value.type_info().name() {
        "INTEGER" | "BOOLEAN" => row.try_get::<i64, _>(index).map(|v| v.to_string()),
        "REAL" => row.try_get::<f64, _>(index).map(|v| v.to_string()),
        "BLOB" => row
            .try_get::<Vec<u8>, _>(index)
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned()),
        _ => row.try_get::<String, _>(index),
    };
    rendered.unwrap_or_else(|_| "NULL".to_string())
}
