use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

use saleschat_db::SchemaMap;

const DDL_KEYWORDS: [&str; 4] = ["DROP", "ALTER", "CREATE", "TRUNCATE"];

const AGGREGATE_MARKERS: [&str; 6] =
    ["count(", "sum(", "avg(", "max(", "min(", "group_concat("];

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SqlRejection {
    #[error("Only SELECT queries are allowed.")]
    NotSelect,
    #[error("DDL statements (DROP, ALTER, CREATE, TRUNCATE) aren't allowed.")]
    DdlKeyword,
    #[error("Error: Couldn't parse FROM clause in query")]
    UnparsableFrom,
    #[error("Error: Table '{table}' doesn't exist in schema. Available tables: {available}")]
    UnknownTable { table: String, available: String },
    #[error("Error: Couldn't parse SELECT clause")]
    UnparsableSelect,
    #[error("Error: Column '{column}' missing in any queried table. Check schema.")]
    UnknownQualifiedColumn { column: String },
    #[error("Error: Column '{column}' missing in queried tables. Available columns: {available}")]
    UnknownColumn { column: String, available: String },
}

fn from_clause_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\bfrom\s+([\w,\s]+?)(?:\s+where|\s+group|\s+order|\s+limit|\s+join|$)")
            .expect("from clause pattern compiles")
    })
}

fn table_separator_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r",|\s+join\s+").expect("table separator pattern compiles"))
}

fn select_clause_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?s)select\s+(.*?)\s+from").expect("select clause pattern compiles")
    })
}

fn column_alias_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\s+as\s+\w+$").expect("column alias pattern compiles"))
}

/// Static gate over model-proposed SQL. This is a cheap heuristic screen, not
/// a SQL parser and not a security boundary: it rejects obviously unsafe or
/// out-of-schema queries before they reach the database.
pub fn validate(query: &str, schema: &SchemaMap) -> Result<(), SqlRejection> {
    let query_upper = query.trim().to_uppercase();
    if !query_upper.starts_with("SELECT") {
        return Err(SqlRejection::NotSelect);
    }

    // Substring screen by intent: it also trips on identifiers that embed a
    // keyword, like `created_at` containing CREATE.
    if DDL_KEYWORDS.iter().any(|keyword| query_upper.contains(keyword)) {
        return Err(SqlRejection::DdlKeyword);
    }

    let query_lower = query.to_lowercase();

    let from_capture = from_clause_pattern()
        .captures(&query_lower)
        .and_then(|captures| captures.get(1))
        .ok_or(SqlRejection::UnparsableFrom)?;

    let tables = table_separator_pattern()
        .split(from_capture.as_str().trim())
        .filter_map(|segment| segment.trim().split_whitespace().next())
        .collect::<Vec<_>>();

    for table in &tables {
        if !schema.contains_key(*table) {
            return Err(SqlRejection::UnknownTable {
                table: (*table).to_string(),
                available: schema.keys().cloned().collect::<Vec<_>>().join(", "),
            });
        }
    }

    let select_clause = select_clause_pattern()
        .captures(&query_lower)
        .and_then(|captures| captures.get(1))
        .map(|capture| capture.as_str().trim().to_string())
        .ok_or(SqlRejection::UnparsableSelect)?;

    // A wildcard anywhere in the select list skips column checking.
    if select_clause.contains('*') {
        return Ok(());
    }

    for column_expr in select_clause.split(',') {
        let column_expr = column_alias_pattern().replace(column_expr.trim(), "");
        let column_expr = column_expr.trim();

        if AGGREGATE_MARKERS.iter().any(|marker| column_expr.contains(marker)) {
            continue;
        }

        if column_expr.contains('.') {
            let mut segments = column_expr.split('.');
            let _alias = segments.next();
            let column = segments.next().unwrap_or_default().trim();

            // Membership is checked against every queried table, so a column
            // qualified with the wrong alias still passes if any table has it.
            let found = tables
                .iter()
                .any(|table| table_has_column(schema, table, column));
            if !found {
                return Err(SqlRejection::UnknownQualifiedColumn { column: column.to_string() });
            }
        } else {
            let column = column_expr;
            let found = tables
                .iter()
                .any(|table| table_has_column(schema, table, column));
            if !found && column != "*" {
                return Err(SqlRejection::UnknownColumn {
                    column: column.to_string(),
                    available: tables
                        .iter()
                        .flat_map(|table| {
                            schema.get(*table).map(Vec::as_slice).unwrap_or_default()
                        })
                        .cloned()
                        .collect::<Vec<_>>()
                        .join(", "),
                });
            }
        }
    }

    Ok(())
}

fn table_has_column(schema: &SchemaMap, table: &str, column: &str) -> bool {
    schema
        .get(table)
        .map(|columns| columns.iter().any(|known| known == column))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use saleschat_db::SchemaMap;

    use super::{validate, SqlRejection};

    fn sales_schema() -> SchemaMap {
        let mut schema = SchemaMap::new();
        schema.insert(
            "customers".to_string(),
            ["id", "name", "email", "phone", "city", "country", "created_at"]
                .map(str::to_string)
                .to_vec(),
        );
        schema.insert(
            "order_items".to_string(),
            ["id", "order_id", "product_id", "quantity", "unit_price", "subsum"]
                .map(str::to_string)
                .to_vec(),
        );
        schema.insert(
            "orders".to_string(),
            ["id", "customer_id", "order_date", "status", "amount_sum"]
                .map(str::to_string)
                .to_vec(),
        );
        schema.insert(
            "products".to_string(),
            ["id", "name", "category", "price", "stock_quantity", "created_at"]
                .map(str::to_string)
                .to_vec(),
        );
        schema
    }

    #[test]
    fn accepts_wildcard_and_plain_column_selects() {
        let schema = sales_schema();

        assert_eq!(validate("SELECT * FROM customers", &schema), Ok(()));
        assert_eq!(validate("  select name, email from customers", &schema), Ok(()));
        assert_eq!(
            validate("SELECT status, amount_sum FROM orders WHERE amount_sum > 100", &schema),
            Ok(())
        );
    }

    #[test]
    fn rejects_anything_that_is_not_a_select() {
        let schema = sales_schema();

        let rejection = validate("UPDATE customers SET name = 'x'", &schema)
            .expect_err("update should be rejected");
        assert_eq!(rejection, SqlRejection::NotSelect);
        assert_eq!(rejection.to_string(), "Only SELECT queries are allowed.");

        assert_eq!(validate("", &schema), Err(SqlRejection::NotSelect));
    }

    #[test]
    fn rejects_ddl_keywords_anywhere_in_the_query() {
        let schema = sales_schema();

        let rejection = validate("SELECT * FROM customers; DROP TABLE orders", &schema)
            .expect_err("piggybacked DDL should be rejected");
        assert_eq!(rejection, SqlRejection::DdlKeyword);
        assert_eq!(
            rejection.to_string(),
            "DDL statements (DROP, ALTER, CREATE, TRUNCATE) aren't allowed."
        );
    }

    #[test]
    fn ddl_screen_is_substring_coarse() {
        // Known false positive: created_at embeds CREATE.
        let schema = sales_schema();
        assert_eq!(
            validate("SELECT created_at FROM products", &schema),
            Err(SqlRejection::DdlKeyword)
        );
    }

    #[test]
    fn rejects_tables_missing_from_the_schema() {
        let schema = sales_schema();

        let rejection = validate("SELECT name FROM invoices", &schema)
            .expect_err("unknown table should be rejected");
        assert_eq!(
            rejection.to_string(),
            "Error: Table 'invoices' doesn't exist in schema. Available tables: customers, order_items, orders, products"
        );

        let rejection = validate("SELECT id FROM orders, invoices", &schema)
            .expect_err("unknown table in a comma join should be rejected");
        assert!(matches!(rejection, SqlRejection::UnknownTable { table, .. } if table == "invoices"));
    }

    #[test]
    fn join_validation_covers_only_the_leading_table() {
        // The FROM capture stops at the first JOIN keyword, so joined tables
        // after it are never checked.
        let schema = sales_schema();
        assert_eq!(
            validate("SELECT * FROM orders JOIN ghosts ON orders.id = ghosts.id", &schema),
            Ok(())
        );
    }

    #[test]
    fn table_aliases_are_dropped_before_lookup() {
        let schema = sales_schema();
        assert_eq!(validate("SELECT status FROM orders o WHERE o.id = 1", &schema), Ok(()));
    }

    #[test]
    fn rejects_unknown_bare_columns_with_available_listing() {
        let schema = sales_schema();

        let rejection = validate("SELECT total FROM orders", &schema)
            .expect_err("unknown column should be rejected");
        assert_eq!(
            rejection.to_string(),
            "Error: Column 'total' missing in queried tables. Available columns: id, customer_id, order_date, status, amount_sum"
        );
    }

    #[test]
    fn qualified_columns_match_any_queried_table() {
        let schema = sales_schema();

        // The alias is ignored: o.email passes because customers has email.
        assert_eq!(validate("SELECT o.email FROM orders, customers", &schema), Ok(()));

        let rejection = validate("SELECT o.nonexistent FROM orders, customers", &schema)
            .expect_err("column absent everywhere should be rejected");
        assert_eq!(
            rejection.to_string(),
            "Error: Column 'nonexistent' missing in any queried table. Check schema."
        );
    }

    #[test]
    fn aggregate_expressions_skip_column_checking() {
        let schema = sales_schema();

        assert_eq!(
            validate("SELECT SUM(amount_sum) AS total FROM orders", &schema),
            Ok(())
        );
        assert_eq!(
            validate("SELECT status, COUNT(id) FROM orders GROUP BY status", &schema),
            Ok(())
        );
    }

    #[test]
    fn unparsable_clauses_report_which_clause_failed() {
        let schema = sales_schema();

        assert_eq!(validate("SELECT 1", &schema), Err(SqlRejection::UnparsableFrom));
        assert_eq!(
            validate("SELECT 1", &schema).unwrap_err().to_string(),
            "Error: Couldn't parse FROM clause in query"
        );

        assert_eq!(validate("SELECT FROM orders", &schema), Err(SqlRejection::UnparsableSelect));
    }

    #[test]
    fn select_parsing_spans_newlines() {
        let schema = sales_schema();
        assert_eq!(
            validate("SELECT name,\n  city\nFROM customers\nLIMIT 5", &schema),
            Ok(())
        );
    }
}
