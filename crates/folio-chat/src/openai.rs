//! Client for OpenAI-compatible chat-completions endpoints
//! (OpenRouter, OpenAI, Ollama, llama.cpp server, ...).

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use folio_core::config::LlmSettings;
use folio_core::{Error, Result};

use crate::message::ToolCallRequest;
use crate::model::{ChatModel, ChatRequest, ChatResponse};

pub struct OpenAiCompatibleClient {
    base_url: String,
    chat_path: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl OpenAiCompatibleClient {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::InvalidConfig(format!("http client: {e}")))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            chat_path: "/chat/completions".to_string(),
            api_key,
            client,
        })
    }

    pub fn from_settings(settings: &LlmSettings) -> Result<Self> {
        let api_key = settings.resolve_api_key();
        if api_key.is_none() {
            tracing::warn!(env = %settings.api_key_env, "no API key configured; requests are sent unauthenticated");
        }
        Self::new(&settings.base_url, api_key, Duration::from_secs(settings.timeout_secs))
    }

    fn apply_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => req.bearer_auth(key),
            None => req,
        }
    }
}

fn transport_err(url: &str, e: &reqwest::Error) -> Error {
    if e.is_timeout() || e.is_connect() {
        Error::ServiceUnavailable(format!("{url}: {e}"))
    } else {
        Error::ModelService(format!("{url}: {e}"))
    }
}

fn parse_tool_call(t: &Value) -> Option<ToolCallRequest> {
    let function = &t["function"];
    let name = function["name"].as_str()?;
    // Some servers send the arguments as an object instead of a string.
    let arguments = match &function["arguments"] {
        Value::String(s) => s.clone(),
        Value::Null => "{}".to_string(),
        other => other.to_string(),
    };
    Some(ToolCallRequest::new(t["id"].as_str().unwrap_or_default(), name, arguments))
}

pub(crate) fn parse_response(json: &Value) -> Result<ChatResponse> {
    let choice = json["choices"]
        .get(0)
        .ok_or_else(|| Error::ModelService("no choices in response".into()))?;
    let message = &choice["message"];
    let content = message["content"].as_str().map(String::from);
    let tool_calls = message["tool_calls"]
        .as_array()
        .map(|calls| calls.iter().filter_map(parse_tool_call).collect())
        .unwrap_or_default();
    Ok(ChatResponse { content, tool_calls })
}

#[async_trait]
impl ChatModel for OpenAiCompatibleClient {
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let url = format!("{}{}", self.base_url, self.chat_path);
        tracing::debug!(%url, model = %request.model, messages = request.messages.len(), tools = request.tools.len(), "chat completion request");
        let req = self.apply_auth(self.client.post(&url).json(request));
        let resp = req.send().await.map_err(|e| transport_err(&url, &e))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            tracing::warn!(%status, body = %text, "chat completion failed");
            return Err(match status.as_u16() {
                429 | 502 | 503 | 504 => Error::ServiceUnavailable(format!("{status}: {text}")),
                _ => Error::ModelService(format!("{status}: {text}")),
            });
        }

        let json: Value = resp.json().await.map_err(|e| Error::ModelService(format!("invalid response body: {e}")))?;
        parse_response(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_text_answer() {
        let r = parse_response(&json!({"choices": [{"message": {"role": "assistant", "content": "Hi"}}]})).unwrap();
        assert_eq!(r, ChatResponse::text("Hi"));
    }

    #[test]
    fn parses_tool_calls_with_object_arguments() {
        let r = parse_response(&json!({"choices": [{"message": {
            "content": null,
            "tool_calls": [
                {"id": "c1", "type": "function", "function": {"name": "search_knowledge_base", "arguments": "{\"query\":\"skills\"}"}},
                {"id": "c2", "type": "function", "function": {"name": "search_knowledge_base", "arguments": {"query": "hobbies"}}}
            ]
        }}]}))
        .unwrap();
        assert_eq!(r.content, None);
        assert_eq!(r.tool_calls.len(), 2);
        assert_eq!(r.tool_calls[0].function.arguments, "{\"query\":\"skills\"}");
        assert_eq!(r.tool_calls[1].function.arguments, "{\"query\":\"hobbies\"}");
    }

    #[test]
    fn missing_choices_is_a_model_error() {
        assert!(matches!(parse_response(&json!({"error": "boom"})), Err(Error::ModelService(_))));
    }
}
