use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::provider::{
    shape_transport_error, ModelMessage, ModelPart, ModelProvider, ModelRole, NormalizedResponse,
    ProviderError,
};
use crate::tools::FunctionDeclaration;

/// Talks to a local Ollama server over its `/api/chat` endpoint. Ollama has
/// no nested-parts history, so every part becomes its own flat chat message.
pub struct OllamaProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    timeout: Duration,
}

impl OllamaProvider {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            model: model.into(),
            timeout: Duration::from_secs(timeout_secs),
        }
    }
}

#[async_trait]
impl ModelProvider for OllamaProvider {
    async fn generate(
        &self,
        history: &[ModelMessage],
        system_instruction: &str,
        tools: &[FunctionDeclaration],
    ) -> Result<NormalizedResponse, ProviderError> {
        let request = ChatRequest {
            model: &self.model,
            messages: chat_messages(history, system_instruction),
            stream: false,
            tools: (!tools.is_empty())
                .then(|| tools.iter().map(|tool| WireTool { kind: "function", function: tool }).collect()),
        };

        let url = format!("{}/api/chat", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await
            .map_err(shape_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::new(format!(
                "Ollama API error: {} - {body}",
                status.as_u16()
            )));
        }

        let decoded: ChatResponse = response.json().await.map_err(shape_transport_error)?;
        let parts = decoded.message.map(normalized_parts).unwrap_or_default();

        Ok(NormalizedResponse { parts })
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<WireTool<'a>>>,
}

#[derive(Serialize)]
struct WireTool<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: &'a FunctionDeclaration,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    #[serde(default)]
    content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct WireToolCall {
    function: WireFunctionCall,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    #[serde(default)]
    arguments: Value,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    message: Option<ChatMessage>,
}

fn role_name(role: ModelRole) -> &'static str {
    match role {
        ModelRole::User => "user",
        ModelRole::Model => "assistant",
    }
}

fn chat_messages(history: &[ModelMessage], system_instruction: &str) -> Vec<ChatMessage> {
    let mut messages = Vec::new();
    if !system_instruction.is_empty() {
        messages.push(ChatMessage {
            role: "system".to_string(),
            content: system_instruction.to_string(),
            tool_calls: None,
        });
    }

    for message in history {
        let role = role_name(message.role);
        for part in &message.parts {
            match part {
                ModelPart::Text(text) => messages.push(ChatMessage {
                    role: role.to_string(),
                    content: text.clone(),
                    tool_calls: None,
                }),
                ModelPart::FunctionCall { name, args } => messages.push(ChatMessage {
                    role: role.to_string(),
                    content: String::new(),
                    tool_calls: Some(vec![WireToolCall {
                        function: WireFunctionCall { name: name.clone(), arguments: args.clone() },
                    }]),
                }),
                ModelPart::FunctionResponse { response, .. } => messages.push(ChatMessage {
                    role: "tool".to_string(),
                    content: serde_json::to_string(response).unwrap_or_default(),
                    tool_calls: None,
                }),
            }
        }
    }

    messages
}

fn normalized_parts(message: ChatMessage) -> Vec<ModelPart> {
    let mut parts = Vec::new();
    if !message.content.is_empty() {
        parts.push(ModelPart::Text(message.content));
    }
    for call in message.tool_calls.unwrap_or_default() {
        parts.push(ModelPart::FunctionCall {
            name: call.function.name,
            args: decode_arguments(call.function.arguments),
        });
    }
    parts
}

// Some models return tool arguments as a JSON string instead of an object.
fn decode_arguments(arguments: Value) -> Value {
    match arguments {
        Value::String(raw) => serde_json::from_str(&raw).unwrap_or_else(|_| json!({})),
        Value::Null => json!({}),
        other => other,
    }
}
