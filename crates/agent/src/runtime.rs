use std::sync::Arc;

use serde_json::Value;

use saleschat_core::conversation::{Conversation, Message, ToolResult};

use crate::provider::{ModelMessage, ModelPart, ModelProvider, ProviderError};
use crate::tools::{declarations, ToolDispatcher};

/// The assistant reply produced by one agent loop run.
#[derive(Clone, Debug, PartialEq)]
pub struct TurnOutcome {
    pub message: String,
    pub tool_results: Vec<ToolResult>,
}

/// Drives the generate / dispatch / regenerate loop against one provider.
///
/// The loop is bounded by `max_iterations`. Each iteration reads one model
/// response, accumulates its text, and dispatches its function calls; a
/// response without calls ends the loop. When the bound is hit, the response
/// generated by the final dispatch round is discarded unread.
pub struct AgentRuntime {
    provider: Arc<dyn ModelProvider>,
    tools: ToolDispatcher,
    system_prompt: String,
    max_iterations: u32,
}

impl AgentRuntime {
    pub fn new(
        provider: Arc<dyn ModelProvider>,
        tools: ToolDispatcher,
        system_prompt: impl Into<String>,
        max_iterations: u32,
    ) -> Self {
        Self { provider, tools, system_prompt: system_prompt.into(), max_iterations }
    }

    /// Appends the user message, runs the loop, and records the assistant
    /// reply. On provider failure the user message stays recorded and the
    /// caller decides what to append.
    pub async fn run_turn(
        &self,
        conversation: &mut Conversation,
        user_message: &str,
    ) -> Result<TurnOutcome, ProviderError> {
        conversation.push_user(user_message);
        let mut history = plain_history(conversation);
        let outcome = self.drive_loop(&mut history, false).await?;
        conversation.push_assistant(outcome.message.clone(), outcome.tool_results.clone());
        Ok(outcome)
    }

    /// Rewinds the conversation to `message_index`, substitutes a new user
    /// message, and replays with full tool context. The rerun loop stops at
    /// the first text-bearing response so an edited question cannot fan out
    /// into another long tool exchange.
    pub async fn run_rerun(
        &self,
        conversation: &mut Conversation,
        message_index: usize,
        new_message: &str,
    ) -> Result<TurnOutcome, ProviderError> {
        conversation.truncate_messages(message_index);
        conversation.push_user(new_message);
        let mut history = replay_history(conversation);
        let outcome = self.drive_loop(&mut history, true).await?;
        conversation.push_assistant(outcome.message.clone(), outcome.tool_results.clone());
        Ok(outcome)
    }

    async fn drive_loop(
        &self,
        history: &mut Vec<ModelMessage>,
        stop_on_text: bool,
    ) -> Result<TurnOutcome, ProviderError> {
        let declared = declarations();
        let mut response =
            self.provider.generate(history, &self.system_prompt, &declared).await?;

        let mut message = String::new();
        let mut tool_results: Vec<ToolResult> = Vec::new();
        let mut iteration = 0u32;

        while iteration < self.max_iterations {
            iteration += 1;

            let mut calls: Vec<(String, Value)> = Vec::new();
            for part in &response.parts {
                match part {
                    ModelPart::FunctionCall { name, args } => {
                        calls.push((name.clone(), args.clone()))
                    }
                    ModelPart::Text(text) => message.push_str(text),
                    ModelPart::FunctionResponse { .. } => {}
                }
            }

            if calls.is_empty() {
                break;
            }

            for (name, args) in calls {
                if name.is_empty() {
                    continue;
                }
                let result = self.tools.dispatch(&name, args.clone()).await;
                history.push(ModelMessage::function_call(&name, args));
                history.push(ModelMessage::function_response(&name, outcome_value(&result)));
                tool_results.push(result);
            }

            if stop_on_text && !message.is_empty() {
                break;
            }

            response = self.provider.generate(history, &self.system_prompt, &declared).await?;
        }

        Ok(TurnOutcome { message, tool_results })
    }
}

/// History for a fresh turn: user and assistant text only. Errors and tool
/// results are not replayed to the model.
fn plain_history(conversation: &Conversation) -> Vec<ModelMessage> {
    conversation
        .messages
        .iter()
        .filter_map(|message| match message {
            Message::User { content, .. } => Some(ModelMessage::user_text(content.clone())),
            Message::Assistant { content, .. } => Some(ModelMessage::model_text(content.clone())),
            Message::Error { .. } => None,
        })
        .collect()
}

/// History for a rerun: each stored tool result is replayed as the original
/// call/response pair so the model keeps its tool context. Assistant text is
/// skipped when empty, errors always.
fn replay_history(conversation: &Conversation) -> Vec<ModelMessage> {
    let mut history = Vec::new();
    for message in &conversation.messages {
        match message {
            Message::User { content, .. } => history.push(ModelMessage::user_text(content.clone())),
            Message::Assistant { content, tool_results, .. } => {
                for result in tool_results {
                    history.push(ModelMessage::function_call(&result.name, result.args.clone()));
                    history.push(ModelMessage::function_response(&result.name, outcome_value(result)));
                }
                if !content.is_empty() {
                    history.push(ModelMessage::model_text(content.clone()));
                }
            }
            Message::Error { .. } => {}
        }
    }
    history
}

fn outcome_value(result: &ToolResult) -> Value {
    serde_json::to_value(&result.outcome).unwrap_or_else(|_| Value::Object(Default::default()))
}
