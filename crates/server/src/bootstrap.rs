use std::sync::Arc;

use saleschat_agent::provider::{GeminiProvider, ModelProvider, OllamaProvider};
use saleschat_agent::runtime::AgentRuntime;
use saleschat_agent::tools::ToolDispatcher;
use saleschat_core::config::{AppConfig, ConfigError, LlmProvider, LoadOptions};
use saleschat_core::prompt::SYSTEM_PROMPT;
use saleschat_core::transcripts::TranscriptStore;
use saleschat_db::{connect_with_settings, migrations, DbPool};
use thiserror::Error;
use tracing::info;

use crate::routes::AppState;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub state: AppState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("llm.api_key is required for the gemini provider")]
    MissingApiKey,
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", "starting application bootstrap");

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(event_name = "system.bootstrap.database_connected", "database connection established");

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(event_name = "system.bootstrap.migrations_applied", "database migrations applied");

    let provider = build_provider(&config)?;
    let dispatcher = ToolDispatcher::new(db_pool.clone(), config.display.show_sql_queries);
    let system_prompt =
        config.llm.system_prompt.clone().unwrap_or_else(|| SYSTEM_PROMPT.to_string());
    let runtime =
        AgentRuntime::new(provider, dispatcher, system_prompt, config.llm.max_iterations);
    let store = Arc::new(TranscriptStore::new(config.transcripts.path.clone()));
    info!(
        event_name = "system.bootstrap.agent_ready",
        provider = ?config.llm.provider,
        "agent runtime initialized"
    );

    Ok(Application { state: AppState { runtime: Arc::new(runtime), store }, config, db_pool })
}

fn build_provider(config: &AppConfig) -> Result<Arc<dyn ModelProvider>, BootstrapError> {
    match config.llm.provider {
        LlmProvider::Gemini => {
            let api_key = config.llm.api_key.clone().ok_or(BootstrapError::MissingApiKey)?;
            Ok(Arc::new(GeminiProvider::new(
                api_key,
                config.llm.gemini_model.clone(),
                config.llm.timeout_secs,
            )))
        }
        LlmProvider::Ollama => Ok(Arc::new(OllamaProvider::new(
            config.llm.ollama_base_url.clone(),
            config.llm.ollama_model.clone(),
            config.llm.timeout_secs,
        ))),
    }
}
