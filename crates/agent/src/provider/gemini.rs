use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::provider::{
    shape_transport_error, ModelMessage, ModelPart, ModelProvider, ModelRole, NormalizedResponse,
    ProviderError,
};
use crate::tools::FunctionDeclaration;

const API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Calls the Gemini `generateContent` REST endpoint. The API key travels in
/// the `x-goog-api-key` header so it never appears in URLs or error text.
pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: SecretString,
    model: String,
    timeout: Duration,
}

impl GeminiProvider {
    pub fn new(api_key: SecretString, model: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model: model.into(),
            timeout: Duration::from_secs(timeout_secs),
        }
    }
}

#[async_trait]
impl ModelProvider for GeminiProvider {
    async fn generate(
        &self,
        history: &[ModelMessage],
        system_instruction: &str,
        tools: &[FunctionDeclaration],
    ) -> Result<NormalizedResponse, ProviderError> {
        let request = GenerateContentRequest {
            contents: wire_contents(history),
            system_instruction: (!system_instruction.is_empty()).then(|| SystemInstruction {
                parts: vec![WirePart { text: Some(system_instruction.to_string()), ..WirePart::default() }],
            }),
            tools: (!tools.is_empty()).then(|| vec![ToolGroup { function_declarations: tools }]),
        };

        let url = format!("{API_BASE_URL}/models/{}:generateContent", self.model);
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", self.api_key.expose_secret())
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await
            .map_err(shape_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::new(format!(
                "Gemini API error: {} - {body}",
                status.as_u16()
            )));
        }

        let decoded: GenerateContentResponse =
            response.json().await.map_err(shape_transport_error)?;
        let candidate = decoded
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::new("Gemini response contained no candidates"))?;
        let parts = candidate.content.map(|content| content.parts).unwrap_or_default();

        Ok(NormalizedResponse { parts: normalized_parts(parts) })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<WireContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<SystemInstruction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ToolGroup<'a>>>,
}

#[derive(Serialize)]
struct SystemInstruction {
    parts: Vec<WirePart>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ToolGroup<'a> {
    function_declarations: &'a [FunctionDeclaration],
}

#[derive(Serialize)]
struct WireContent {
    role: &'static str,
    parts: Vec<WirePart>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct WirePart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_call: Option<WireFunctionCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_response: Option<WireFunctionResponse>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    args: Option<Value>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct WireFunctionResponse {
    name: String,
    response: Value,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<WirePart>,
}

fn role_name(role: ModelRole) -> &'static str {
    match role {
        ModelRole::User => "user",
        ModelRole::Model => "model",
    }
}

fn wire_contents(history: &[ModelMessage]) -> Vec<WireContent> {
    history
        .iter()
        .map(|message| WireContent {
            role: role_name(message.role),
            parts: message.parts.iter().map(wire_part).collect(),
        })
        .collect()
}

fn wire_part(part: &ModelPart) -> WirePart {
    match part {
        ModelPart::Text(text) => WirePart { text: Some(text.clone()), ..WirePart::default() },
        ModelPart::FunctionCall { name, args } => WirePart {
            function_call: Some(WireFunctionCall {
                name: name.clone(),
                args: Some(args.clone()),
            }),
            ..WirePart::default()
        },
        ModelPart::FunctionResponse { name, response } => WirePart {
            function_response: Some(WireFunctionResponse {
                name: name.clone(),
                response: response.clone(),
            }),
            ..WirePart::default()
        },
    }
}

fn normalized_parts(parts: Vec<WirePart>) -> Vec<ModelPart> {
    parts
        .into_iter()
        .map(|part| {
            if let Some(call) = part.function_call {
                ModelPart::FunctionCall {
                    name: call.name,
                    args: call.args.unwrap_or_else(|| json!({})),
                }
            } else {
                ModelPart::Text(part.text.unwrap_or_default())
            }
        })
        .collect()
}
