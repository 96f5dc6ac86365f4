use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use saleschat_core::config::{AppConfig, LoadOptions};
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let source = |key_path: &str, env_keys: &[&str]| {
        field_source(key_path, env_keys, config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];

    lines.push(render_line(
        "database.url",
        &config.database.url,
        source("database.url", &["SALESCHAT_DATABASE_URL"]),
    ));
    lines.push(render_line(
        "database.max_connections",
        &config.database.max_connections.to_string(),
        source("database.max_connections", &["SALESCHAT_DATABASE_MAX_CONNECTIONS"]),
    ));
    lines.push(render_line(
        "database.timeout_secs",
        &config.database.timeout_secs.to_string(),
        source("database.timeout_secs", &["SALESCHAT_DATABASE_TIMEOUT_SECS"]),
    ));

    lines.push(render_line(
        "llm.provider",
        &format!("{:?}", config.llm.provider),
        source("llm.provider", &["SALESCHAT_LLM_PROVIDER"]),
    ));
    let llm_api_key = if config.llm.api_key.is_some() { "<redacted>" } else { "<unset>" };
    lines.push(render_line(
        "llm.api_key",
        llm_api_key,
        source("llm.api_key", &["SALESCHAT_LLM_API_KEY", "GOOGLE_API_KEY"]),
    ));
    lines.push(render_line(
        "llm.gemini_model",
        &config.llm.gemini_model,
        source("llm.gemini_model", &["SALESCHAT_LLM_GEMINI_MODEL"]),
    ));
    lines.push(render_line(
        "llm.ollama_base_url",
        &config.llm.ollama_base_url,
        source("llm.ollama_base_url", &["SALESCHAT_LLM_OLLAMA_BASE_URL"]),
    ));
    lines.push(render_line(
        "llm.ollama_model",
        &config.llm.ollama_model,
        source("llm.ollama_model", &["SALESCHAT_LLM_OLLAMA_MODEL"]),
    ));
    lines.push(render_line(
        "llm.timeout_secs",
        &config.llm.timeout_secs.to_string(),
        source("llm.timeout_secs", &["SALESCHAT_LLM_TIMEOUT_SECS"]),
    ));
    lines.push(render_line(
        "llm.max_iterations",
        &config.llm.max_iterations.to_string(),
        source("llm.max_iterations", &["SALESCHAT_LLM_MAX_ITERATIONS"]),
    ));

    lines.push(render_line(
        "server.bind_address",
        &config.server.bind_address,
        source("server.bind_address", &["SALESCHAT_SERVER_BIND_ADDRESS"]),
    ));
    lines.push(render_line(
        "server.port",
        &config.server.port.to_string(),
        source("server.port", &["SALESCHAT_SERVER_PORT"]),
    ));
    lines.push(render_line(
        "server.health_check_port",
        &config.server.health_check_port.to_string(),
        source("server.health_check_port", &["SALESCHAT_SERVER_HEALTH_CHECK_PORT"]),
    ));

    lines.push(render_line(
        "transcripts.path",
        &config.transcripts.path.display().to_string(),
        source("transcripts.path", &["SALESCHAT_TRANSCRIPTS_PATH"]),
    ));
    lines.push(render_line(
        "display.show_sql_queries",
        &config.display.show_sql_queries.to_string(),
        source("display.show_sql_queries", &["SALESCHAT_DISPLAY_SHOW_SQL_QUERIES"]),
    ));

    lines.push(render_line(
        "logging.level",
        &config.logging.level,
        source("logging.level", &["SALESCHAT_LOGGING_LEVEL", "SALESCHAT_LOG_LEVEL"]),
    ));
    lines.push(render_line(
        "logging.format",
        &format!("{:?}", config.logging.format),
        source("logging.format", &["SALESCHAT_LOGGING_FORMAT", "SALESCHAT_LOG_FORMAT"]),
    ));

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from("saleschat.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/saleschat.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    for env_key in env_keys {
        if env::var_os(env_key).is_some() {
            return format!("env ({env_key})");
        }
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}
