use serde::Serialize;
use serde_json::{json, Value};

use saleschat_core::conversation::{DiagramDataset, ToolOutcome, ToolResult};
use saleschat_db::{describe_schema, fetch_sample, run_select, schema_map, DbPool};

use crate::guard;

pub const SAMPLE_TABLES: [&str; 4] = ["customers", "products", "orders", "order_items"];

const DEFAULT_SAMPLE_LIMIT: i64 = 5;

const CHART_TYPES: [&str; 6] = ["pie", "doughnut", "polarArea", "radar", "line", "bar"];

/// One callable tool as advertised to the model.
#[derive(Clone, Debug, Serialize)]
pub struct FunctionDeclaration {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Value,
}

pub fn declarations() -> Vec<FunctionDeclaration> {
    vec![
        FunctionDeclaration {
            name: "get_database_schema",
            description: "Get the complete database schema including all tables and their columns. Use this to understand the database structure before writing queries.",
            parameters: json!({
                "type": "object",
                "properties": {},
                "required": []
            }),
        },
        FunctionDeclaration {
            name: "execute_sql_query",
            description: "Execute a read-only SQL SELECT query against the sales database. Returns the results as structured data.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "A SELECT SQL query to execute (INSERT, UPDATE, DELETE are not allowed)"
                    }
                },
                "required": ["query"]
            }),
        },
        FunctionDeclaration {
            name: "get_sample_data",
            description: "Get sample rows from a specific table to understand the data structure.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "table_name": {
                        "type": "string",
                        "description": "Name of the table to sample",
                        "enum": SAMPLE_TABLES
                    },
                    "limit": {
                        "type": "integer",
                        "description": "Number of sample rows to return (default: 5)"
                    }
                },
                "required": ["table_name"]
            }),
        },
        FunctionDeclaration {
            name: "generate_diagram",
            description: "Generate a chart specification from data you have already retrieved. Use this to visualize query results for the user.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "chart_type": {
                        "type": "string",
                        "description": "Type of chart to render",
                        "enum": CHART_TYPES
                    },
                    "title": {
                        "type": "string",
                        "description": "Chart title"
                    },
                    "labels": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Axis or segment labels"
                    },
                    "datasets": {
                        "type": "array",
                        "description": "One or more data series, each with a label and numeric data points",
                        "items": {
                            "type": "object",
                            "properties": {
                                "label": {"type": "string"},
                                "data": {"type": "array", "items": {"type": "number"}}
                            },
                            "required": ["label", "data"]
                        }
                    }
                },
                "required": ["chart_type", "title", "labels", "datasets"]
            }),
        },
    ]
}

/// Executes model-requested tool calls. Every failure is folded into an
/// `error` outcome so the model always receives an observation to react to.
#[derive(Clone, Debug)]
pub struct ToolDispatcher {
    pool: DbPool,
    show_sql_queries: bool,
}

impl ToolDispatcher {
    pub fn new(pool: DbPool, show_sql_queries: bool) -> Self {
        Self { pool, show_sql_queries }
    }

    pub async fn dispatch(&self, name: &str, args: Value) -> ToolResult {
        tracing::debug!(tool = name, "dispatching tool call");
        let outcome = self.run(name, &args).await;
        ToolResult::new(name, args, outcome)
    }

    async fn run(&self, name: &str, args: &Value) -> ToolOutcome {
        match name {
            "get_database_schema" => self.database_schema().await,
            "execute_sql_query" => self.sql_query(args).await,
            "get_sample_data" => self.sample_data(args).await,
            "generate_diagram" => diagram_outcome(args),
            unknown => ToolOutcome::Error {
                error: format!("Unknown function: {unknown}"),
                query: None,
            },
        }
    }

    async fn database_schema(&self) -> ToolOutcome {
        match describe_schema(&self.pool).await {
            Ok(content) => ToolOutcome::Text { content },
            Err(error) => ToolOutcome::Error { error: format!("Error: {error}"), query: None },
        }
    }

    async fn sql_query(&self, args: &Value) -> ToolOutcome {
        let query = args.get("query").and_then(Value::as_str).unwrap_or("").to_string();
        let echoed_query = self.show_sql_queries.then(|| query.clone());

        let schema = match schema_map(&self.pool).await {
            Ok(schema) => schema,
            Err(error) => {
                return ToolOutcome::Error {
                    error: format!("Error: {error}"),
                    query: echoed_query,
                }
            }
        };

        if let Err(rejection) = guard::validate(&query, &schema) {
            tracing::warn!(reason = %rejection, "rejected model query");
            return ToolOutcome::Error { error: rejection.to_string(), query: echoed_query };
        }

        match run_select(&self.pool, &query).await {
            Ok(output) => ToolOutcome::Table {
                query: echoed_query,
                table_name: None,
                row_count: output.row_count(),
                columns: output.columns,
                rows: output.rows,
            },
            Err(error) => {
                ToolOutcome::Error { error: sql_error_message(&error), query: echoed_query }
            }
        }
    }

    async fn sample_data(&self, args: &Value) -> ToolOutcome {
        let table_name = args.get("table_name").and_then(Value::as_str).unwrap_or("").to_string();
        let limit = args.get("limit").and_then(Value::as_i64).unwrap_or(DEFAULT_SAMPLE_LIMIT);

        if !SAMPLE_TABLES.contains(&table_name.as_str()) {
            return ToolOutcome::Error {
                error: format!("Table must be one of {}", SAMPLE_TABLES.join(", ")),
                query: None,
            };
        }

        match fetch_sample(&self.pool, &table_name, limit).await {
            Ok(output) => ToolOutcome::Table {
                query: None,
                table_name: Some(table_name),
                row_count: output.row_count(),
                columns: output.columns,
                rows: output.rows,
            },
            Err(error) => ToolOutcome::Error { error: sql_error_message(&error), query: None },
        }
    }
}

fn diagram_outcome(args: &Value) -> ToolOutcome {
    let chart_type = args.get("chart_type").and_then(Value::as_str).unwrap_or("");
    let title = args.get("title").and_then(Value::as_str).unwrap_or("");

    let labels = args
        .get("labels")
        .cloned()
        .and_then(|value| serde_json::from_value::<Vec<String>>(value).ok());
    let datasets = args
        .get("datasets")
        .cloned()
        .and_then(|value| serde_json::from_value::<Vec<DiagramDataset>>(value).ok());

    let (Some(labels), Some(datasets)) = (labels, datasets) else {
        return ToolOutcome::Error {
            error: "Error: generate_diagram requires chart_type, title, labels, and datasets"
                .to_string(),
            query: None,
        };
    };

    if chart_type.is_empty() || title.is_empty() {
        return ToolOutcome::Error {
            error: "Error: generate_diagram requires chart_type, title, labels, and datasets"
                .to_string(),
            query: None,
        };
    }

    if !CHART_TYPES.contains(&chart_type) {
        return ToolOutcome::Error {
            error: format!("Error: chart_type must be one of {}", CHART_TYPES.join(", ")),
            query: None,
        };
    }

    if datasets.is_empty() {
        return ToolOutcome::Error {
            error: "Error: generate_diagram requires at least one dataset".to_string(),
            query: None,
        };
    }

    ToolOutcome::Diagram {
        chart_type: chart_type.to_string(),
        title: title.to_string(),
        labels,
        datasets,
    }
}

fn sql_error_message(error: &sqlx::Error) -> String {
    match error {
        sqlx::Error::Database(db_error) => format!("SQL Error: {}", db_error.message()),
        other => format!("Error: {other}"),
    }
}
