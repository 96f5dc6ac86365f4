use std::collections::BTreeMap;

use sqlx::Row;

use crate::DbPool;

/// Table name to lower-cased column names, in declaration order.
pub type SchemaMap = BTreeMap<String, Vec<String>>;

const USER_TABLES: &str = "SELECT name FROM sqlite_master \
     WHERE type = 'table' AND name NOT LIKE 'sqlite_%' AND name NOT LIKE '_sqlx_%' \
     ORDER BY name";

async fn user_tables(pool: &DbPool) -> Result<Vec<String>, sqlx::Error> {
    let rows = sqlx::query(USER_TABLES).fetch_all(pool).await?;
    Ok(rows.into_iter().map(|row| row.get::<String, _>("name")).collect())
}

/// Snapshot of the live schema, rebuilt on every call so validation always
/// reflects the current database state.
pub async fn schema_map(pool: &DbPool) -> Result<SchemaMap, sqlx::Error> {
    let mut schema = SchemaMap::new();
    for table in user_tables(pool).await? {
        let columns = sqlx::query(&format!("PRAGMA table_info({table})"))
            .fetch_all(pool)
            .await?
            .into_iter()
            .map(|row| row.get::<String, _>("name").to_lowercase())
            .collect();
        schema.insert(table, columns);
    }
    Ok(schema)
}

/// Human-readable schema listing handed to the model: one block per table
/// with column names, declared types, and key/nullability markers.
pub async fn describe_schema(pool: &DbPool) -> Result<String, sqlx::Error> {
    let mut lines = Vec::new();
    for table in user_tables(pool).await? {
        lines.push(format!("\nTable: {table}"));
        lines.push("Columns:".to_string());
        for row in sqlx::query(&format!("PRAGMA table_info({table})")).fetch_all(pool).await? {
            let name = row.get::<String, _>("name");
            let declared_type = row.get::<String, _>("type");
            let pk = if row.get::<i64, _>("pk") != 0 { " (PRIMARY KEY)" } else { "" };
            let not_null = if row.get::<i64, _>("notnull") != 0 { " NOT NULL" } else { "" };
            lines.push(format!("  - {name}: {declared_type}{pk}{not_null}"));
        }
    }
    Ok(lines.join("\n"))
}
