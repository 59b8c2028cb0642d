//! Two-round tool-calling conversation.
//!
//! A turn sends the system prompt plus the recent history with the tool
//! declarations. If the model asks for a tool, the first requested call is
//! executed and its result goes back in a second request without tools;
//! that second answer ends the turn. Only the first call of a round is
//! honoured, extra calls are logged and dropped.
//!
//! History is committed only when a turn succeeds. A failed turn leaves no
//! trace, not even the user message.

use serde_json::Value;
use std::iter;
use std::sync::Arc;
use std::time::Duration;

use folio_core::config::{ChatSettings, LlmSettings};
use folio_core::{Error, Result};

use crate::message::{Message, ToolCallRequest, WireMessage};
use crate::model::{ChatModel, ChatRequest, ChatResponse};
use crate::prompt::default_system_prompt;
use crate::tools::{tool_definitions, ToolInvoker};

#[derive(Debug, Clone, PartialEq)]
pub struct EngineOptions {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Most recent messages (including the new user message) sent per turn.
    pub history_window: usize,
    pub timeout: Duration,
    pub subject: String,
    pub system_prompt: Option<String>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self::from_settings(&LlmSettings::default(), &ChatSettings::default())
    }
}

impl EngineOptions {
    pub fn from_settings(llm: &LlmSettings, chat: &ChatSettings) -> Self {
        Self {
            model: llm.model.clone(),
            temperature: llm.temperature,
            max_tokens: llm.max_tokens,
            history_window: chat.history_window,
            timeout: Duration::from_secs(llm.timeout_secs),
            subject: chat.subject.clone(),
            system_prompt: chat.system_prompt.clone(),
        }
    }
}

/// Where a turn currently stands.
#[derive(Debug)]
enum TurnState {
    AwaitingFirstResponse,
    AwaitingToolResult { call: ToolCallRequest, content: Option<String> },
    AwaitingFinalResponse,
    Done(String),
}

pub struct ConversationEngine {
    model: Arc<dyn ChatModel>,
    tools: Arc<ToolInvoker>,
    options: EngineOptions,
    system_prompt: String,
    tool_definitions: Vec<Value>,
    history: Vec<Message>,
}

impl ConversationEngine {
    pub fn new(model: Arc<dyn ChatModel>, tools: Arc<ToolInvoker>, options: EngineOptions) -> Self {
        let system_prompt = options
            .system_prompt
            .clone()
            .unwrap_or_else(|| default_system_prompt(&options.subject));
        let tool_definitions = tool_definitions(&options.subject);
        Self { model, tools, options, system_prompt, tool_definitions, history: Vec::new() }
    }

    pub fn history(&self) -> &[Message] { &self.history }

    pub fn system_prompt(&self) -> &str { &self.system_prompt }

    pub fn reset(&mut self) {
        self.history.clear();
    }

    /// Runs one turn and returns the assistant's answer. On error the
    /// history is left exactly as it was before the call.
    pub async fn chat(&mut self, user_message: &str) -> Result<String> {
        let pending = Message::user(user_message);
        let mut context = self.context_with(&pending);
        let mut state = TurnState::AwaitingFirstResponse;

        let answer = loop {
            state = match state {
                TurnState::AwaitingFirstResponse => {
                    let response = self.complete(&context, true).await?;
                    let mut calls = response.tool_calls.into_iter();
                    match calls.next() {
                        Some(call) => {
                            let dropped: Vec<String> = calls.map(|c| c.function.name).collect();
                            if !dropped.is_empty() {
                                tracing::warn!(executed = %call.function.name, ?dropped, "model requested several tool calls; only the first is executed");
                            }
                            TurnState::AwaitingToolResult { call, content: response.content }
                        }
                        None => TurnState::Done(response.content.unwrap_or_default()),
                    }
                }
                TurnState::AwaitingToolResult { call, content } => {
                    let result = self.tools.invoke(&call.function.name, &call.function.arguments).await;
                    tracing::debug!(tool = %call.function.name, "tool executed");
                    let id = call.id.clone();
                    context.push(WireMessage::assistant_tool_call(content, call));
                    context.push(WireMessage::tool_result(id, result.to_json()));
                    TurnState::AwaitingFinalResponse
                }
                TurnState::AwaitingFinalResponse => {
                    let response = self.complete(&context, false).await?;
                    if !response.tool_calls.is_empty() {
                        tracing::warn!(count = response.tool_calls.len(), "ignoring tool calls in the final round");
                    }
                    TurnState::Done(response.content.unwrap_or_default())
                }
                TurnState::Done(answer) => break answer,
            };
        };

        self.history.push(pending);
        self.history.push(Message::assistant(answer.clone()));
        Ok(answer)
    }

    fn context_with(&self, pending: &Message) -> Vec<WireMessage> {
        let recent: Vec<&Message> = self.history.iter().chain(iter::once(pending)).collect();
        let start = recent.len().saturating_sub(self.options.history_window);
        iter::once(WireMessage::system(self.system_prompt.clone()))
            .chain(recent[start..].iter().map(|m| WireMessage::from(*m)))
            .collect()
    }

    async fn complete(&self, context: &[WireMessage], with_tools: bool) -> Result<ChatResponse> {
        let request = ChatRequest {
            model: self.options.model.clone(),
            messages: context.to_vec(),
            tools: if with_tools { self.tool_definitions.clone() } else { vec![] },
            tool_choice: with_tools.then(|| "auto".to_string()),
            temperature: self.options.temperature,
            max_tokens: self.options.max_tokens,
        };
        match tokio::time::timeout(self.options.timeout, self.model.complete(&request)).await {
            Ok(result) => result,
            Err(_) => Err(Error::ServiceUnavailable(format!(
                "model did not answer within {}s",
                self.options.timeout.as_secs_f32()
            ))),
        }
    }
}
