pub mod config;
pub mod conversation;
pub mod prompt;
pub mod transcripts;

pub use config::{
    AppConfig, ConfigError, ConfigOverrides, DatabaseConfig, DisplayConfig, LlmConfig,
    LlmProvider, LoadOptions, LogFormat, LoggingConfig, ServerConfig, TranscriptConfig,
};
pub use conversation::{
    derive_title, Conversation, ConversationSummary, DiagramDataset, Message, ToolOutcome,
    ToolResult,
};
pub use prompt::SYSTEM_PROMPT;
pub use transcripts::{ConversationMap, StoreError, TranscriptStore};
