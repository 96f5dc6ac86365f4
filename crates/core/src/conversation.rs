use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

pub const TITLE_MAX_CHARS: usize = 50;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub messages: Vec<Message>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Message {
    User {
        content: String,
        timestamp: DateTime<Utc>,
    },
    Assistant {
        content: String,
        #[serde(default)]
        tool_results: Vec<ToolResult>,
        timestamp: DateTime<Utc>,
    },
    Error {
        content: String,
        is_critical: bool,
        timestamp: DateTime<Utc>,
    },
}

/// One tool invocation and its outcome. `name` and `args` are kept alongside
/// the outcome so a stored transcript can be replayed as model history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub name: String,
    #[serde(default = "empty_args")]
    pub args: Value,
    #[serde(flatten)]
    pub outcome: ToolOutcome,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolOutcome {
    Text {
        content: String,
    },
    Table {
        #[serde(skip_serializing_if = "Option::is_none")]
        query: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        table_name: Option<String>,
        columns: Vec<String>,
        rows: Vec<Vec<String>>,
        row_count: usize,
    },
    Error {
        error: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        query: Option<String>,
    },
    Diagram {
        chart_type: String,
        title: String,
        labels: Vec<String>,
        datasets: Vec<DiagramDataset>,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DiagramDataset {
    pub label: String,
    pub data: Vec<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub message_count: usize,
}

fn empty_args() -> Value {
    Value::Object(serde_json::Map::new())
}

pub fn derive_title(first_message: &str) -> String {
    let mut title = first_message.chars().take(TITLE_MAX_CHARS).collect::<String>();
    if first_message.chars().count() > TITLE_MAX_CHARS {
        title.push_str("...");
    }
    title
}

impl Conversation {
    pub fn new(id: impl Into<String>, first_message: &str) -> Self {
        Self {
            id: id.into(),
            title: derive_title(first_message),
            created_at: Utc::now(),
            messages: Vec::new(),
        }
    }

    pub fn started_by(first_message: &str) -> Self {
        Self::new(Uuid::new_v4().to_string(), first_message)
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.messages.push(Message::User { content: content.into(), timestamp: Utc::now() });
    }

    pub fn push_assistant(&mut self, content: impl Into<String>, tool_results: Vec<ToolResult>) {
        self.messages.push(Message::Assistant {
            content: content.into(),
            tool_results,
            timestamp: Utc::now(),
        });
    }

    pub fn push_error(&mut self, content: impl Into<String>, is_critical: bool) {
        self.messages.push(Message::Error {
            content: content.into(),
            is_critical,
            timestamp: Utc::now(),
        });
    }

    /// Drops every message at or after `index`. Out-of-range indexes leave the
    /// transcript untouched.
    pub fn truncate_messages(&mut self, index: usize) {
        self.messages.truncate(index);
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    pub fn summary(&self) -> ConversationSummary {
        ConversationSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            created_at: self.created_at,
            message_count: self.messages.len(),
        }
    }
}

impl ToolResult {
    pub fn new(name: impl Into<String>, args: Value, outcome: ToolOutcome) -> Self {
        Self { name: name.into(), args, outcome }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.outcome, ToolOutcome::Error { .. })
    }
}
