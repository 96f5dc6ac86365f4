use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::tools::FunctionDeclaration;

pub mod gemini;
pub mod ollama;

pub use gemini::GeminiProvider;
pub use ollama::OllamaProvider;

/// Who authored a history entry, in model terms. Tool responses travel under
/// the user role because that is how both upstream APIs expect them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModelRole {
    User,
    Model,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ModelPart {
    Text(String),
    FunctionCall { name: String, args: Value },
    FunctionResponse { name: String, response: Value },
}

#[derive(Clone, Debug, PartialEq)]
pub struct ModelMessage {
    pub role: ModelRole,
    pub parts: Vec<ModelPart>,
}

impl ModelMessage {
    pub fn user_text(content: impl Into<String>) -> Self {
        Self { role: ModelRole::User, parts: vec![ModelPart::Text(content.into())] }
    }

    pub fn model_text(content: impl Into<String>) -> Self {
        Self { role: ModelRole::Model, parts: vec![ModelPart::Text(content.into())] }
    }

    pub fn function_call(name: impl Into<String>, args: Value) -> Self {
        Self {
            role: ModelRole::Model,
            parts: vec![ModelPart::FunctionCall { name: name.into(), args }],
        }
    }

    pub fn function_response(name: impl Into<String>, response: Value) -> Self {
        Self {
            role: ModelRole::User,
            parts: vec![ModelPart::FunctionResponse { name: name.into(), response }],
        }
    }
}

/// A single model turn, reduced to the parts the agent loop acts on.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NormalizedResponse {
    pub parts: Vec<ModelPart>,
}

/// Transport and API failures from either provider. The message is shaped by
/// the adapters so `classify_failure` can route it on substrings alone.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ProviderError {
    pub message: String,
}

impl ProviderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

#[async_trait]
pub trait ModelProvider: Send + Sync {
    async fn generate(
        &self,
        history: &[ModelMessage],
        system_instruction: &str,
        tools: &[FunctionDeclaration],
    ) -> Result<NormalizedResponse, ProviderError>;
}

/// Shapes transport failures so `classify_failure` sees its timeout and
/// connection markers.
pub(crate) fn shape_transport_error(error: reqwest::Error) -> ProviderError {
    if error.is_timeout() {
        ProviderError::new(format!("Request timeout: {error}"))
    } else if error.is_connect() {
        ProviderError::new(format!("Connection error: {error}"))
    } else {
        ProviderError::new(error.to_string())
    }
}

pub const RATE_LIMIT_MESSAGE: &str = "Rate limit reached. Please wait a moment and try again.";

pub const CONNECTION_MESSAGE: &str = "Connection issue. Please try again.";

/// What a provider failure should look like to the end user.
#[derive(Clone, Debug, PartialEq)]
pub struct FailureDisposition {
    pub user_message: String,
    pub is_critical: bool,
}

/// Buckets a provider failure by message content. Rate limiting is checked
/// before connectivity, and anything unrecognized passes through verbatim as
/// a critical error.
pub fn classify_failure(message: &str) -> FailureDisposition {
    let lowered = message.to_lowercase();
    if ["rate", "quota", "limit"].iter().any(|marker| lowered.contains(marker)) {
        FailureDisposition { user_message: RATE_LIMIT_MESSAGE.to_string(), is_critical: false }
    } else if ["timeout", "connection"].iter().any(|marker| lowered.contains(marker)) {
        FailureDisposition { user_message: CONNECTION_MESSAGE.to_string(), is_critical: false }
    } else {
        FailureDisposition { user_message: message.to_string(), is_critical: true }
    }
}

#[cfg(test)]
mod tests {
    use super::{classify_failure, CONNECTION_MESSAGE, RATE_LIMIT_MESSAGE};

    #[test]
    fn quota_failures_are_retryable_rate_limits() {
        let disposition = classify_failure("Gemini API error: 429 - quota exceeded for project");
        assert_eq!(disposition.user_message, RATE_LIMIT_MESSAGE);
        assert!(!disposition.is_critical);
    }

    #[test]
    fn timeout_and_connect_failures_are_retryable() {
        for message in ["Request timeout: operation timed out", "Connection error: refused"] {
            let disposition = classify_failure(message);
            assert_eq!(disposition.user_message, CONNECTION_MESSAGE, "for {message}");
            assert!(!disposition.is_critical);
        }
    }

    #[test]
    fn rate_markers_win_over_connectivity_markers() {
        let disposition = classify_failure("timeout while checking rate limit");
        assert_eq!(disposition.user_message, RATE_LIMIT_MESSAGE);
    }

    #[test]
    fn unrecognized_failures_pass_through_as_critical() {
        let disposition = classify_failure("Gemini response contained no candidates");
        assert_eq!(disposition.user_message, "Gemini response contained no candidates");
        assert!(disposition.is_critical);
    }
}
