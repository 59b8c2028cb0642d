//! HTTP-level tests for the OpenAI-compatible client against a mock server.

use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use folio_chat::message::{Role, WireMessage};
use folio_chat::tools::tool_definitions;
use folio_chat::{ChatModel, ChatRequest, OpenAiCompatibleClient};
use folio_core::Error;

fn request(with_tools: bool) -> ChatRequest {
    ChatRequest {
        model: "test-model".into(),
        messages: vec![WireMessage::system("be nice"), WireMessage::text(Role::User, "hi")],
        tools: if with_tools { tool_definitions("Glory") } else { vec![] },
        tool_choice: with_tools.then(|| "auto".to_string()),
        temperature: 0.7,
        max_tokens: 700,
    }
}

fn client(server: &MockServer) -> OpenAiCompatibleClient {
    OpenAiCompatibleClient::new(server.uri(), Some("test-key".into()), Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn sends_bearer_auth_and_tool_declarations() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(json!({
            "model": "test-model",
            "tool_choice": "auto",
            "max_tokens": 700,
            "messages": [{"role": "system", "content": "be nice"}, {"role": "user", "content": "hi"}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "Hello!"}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = client(&server).complete(&request(true)).await.unwrap();
    assert_eq!(response.content.as_deref(), Some("Hello!"));
    assert!(response.tool_calls.is_empty());

    let received = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();
    assert_eq!(body["tools"][0]["function"]["name"], json!("search_knowledge_base"));
    assert_eq!(body["tools"][0]["type"], json!("function"));
}

#[tokio::test]
async fn final_round_omits_tools() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "ok"}}]
        })))
        .mount(&server)
        .await;

    client(&server).complete(&request(false)).await.unwrap();
    let received = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();
    assert!(body.get("tools").is_none());
    assert!(body.get("tool_choice").is_none());
}

#[tokio::test]
async fn parses_tool_calls() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": "call_abc",
                    "type": "function",
                    "function": {"name": "search_knowledge_base", "arguments": "{\"query\":\"projects\"}"}
                }]
            }}]
        })))
        .mount(&server)
        .await;

    let response = client(&server).complete(&request(true)).await.unwrap();
    assert_eq!(response.content, None);
    assert_eq!(response.tool_calls.len(), 1);
    let call = &response.tool_calls[0];
    assert_eq!(call.id, "call_abc");
    assert_eq!(call.function.name, "search_knowledge_base");
    assert_eq!(call.function.arguments, "{\"query\":\"projects\"}");
}

#[tokio::test]
async fn server_error_is_a_model_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal"))
        .mount(&server)
        .await;

    let err = client(&server).complete(&request(true)).await.unwrap_err();
    assert!(matches!(err, Error::ModelService(ref m) if m.contains("internal")), "{err:?}");
}

#[tokio::test]
async fn overload_is_service_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = client(&server).complete(&request(true)).await.unwrap_err();
    assert!(matches!(err, Error::ServiceUnavailable(_)), "{err:?}");
}

#[tokio::test]
async fn slow_server_is_service_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let client = OpenAiCompatibleClient::new(server.uri(), None, Duration::from_millis(200)).unwrap();
    let err = client.complete(&request(true)).await.unwrap_err();
    assert!(matches!(err, Error::ServiceUnavailable(_)), "{err:?}");
}

#[tokio::test]
async fn unreachable_server_is_service_unavailable() {
    // Nothing listens on the discard port.
    let client = OpenAiCompatibleClient::new("http://127.0.0.1:9", None, Duration::from_secs(2)).unwrap();
    let err = client.complete(&request(true)).await.unwrap_err();
    assert!(matches!(err, Error::ServiceUnavailable(_)), "{err:?}");
}

#[tokio::test]
async fn trailing_slash_in_base_url_is_ignored() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": "ok"}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = OpenAiCompatibleClient::new(format!("{}/v1/", server.uri()), None, Duration::from_secs(5)).unwrap();
    assert_eq!(client.complete(&request(false)).await.unwrap().content.as_deref(), Some("ok"));
}
