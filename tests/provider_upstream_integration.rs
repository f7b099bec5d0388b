//! OpenAI-compatible provider against a mock upstream

use futures::StreamExt;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use chatrelay::config::ProviderConfig;
use chatrelay::error::ChatRelayError;
use chatrelay::providers::{CompletionParams, CompletionProvider, Message, OpenAiCompatibleProvider};

fn provider_for(server: &MockServer) -> OpenAiCompatibleProvider {
    let config = ProviderConfig {
        api_key: Some("gsk_test".to_string()),
        api_base: Some(format!("{}/openai/v1", server.uri())),
        model: Some("test-model".to_string()),
        ..ProviderConfig::default()
    };
    OpenAiCompatibleProvider::new(&config).unwrap()
}

fn chunk(content: &str) -> String {
    format!(
        "data: {}\n\n",
        json!({"choices": [{"delta": {"content": content}}]})
    )
}

#[tokio::test]
async fn test_complete_sends_model_defaults_and_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/openai/v1/chat/completions"))
        .and(header("authorization", "Bearer gsk_test"))
        .and(body_partial_json(json!({
            "model": "test-model",
            "temperature": 0.7,
            "max_tokens": 512,
            "stream": false
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "cmpl-1",
            "choices": [{"message": {"role": "assistant", "content": "Hi there"}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider_for(&server);
    let completion = provider
        .complete(&[Message::user("hello")], CompletionParams::default())
        .await
        .unwrap();

    assert_eq!(completion.content, "Hi there");
    assert_eq!(completion.raw["id"], "cmpl-1");
}

#[tokio::test]
async fn test_complete_surfaces_upstream_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .mount(&server)
        .await;

    let provider = provider_for(&server);
    let err = provider
        .complete(&[Message::user("hello")], CompletionParams::default())
        .await
        .unwrap_err();

    match err.downcast_ref::<ChatRelayError>() {
        Some(ChatRelayError::Upstream { status, .. }) => assert_eq!(*status, Some(429)),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_stream_yields_content_deltas_in_order() {
    let server = MockServer::start().await;
    let body = format!(
        "{}{}data: {}\n\n{}data: [DONE]\n\n",
        chunk("Hel"),
        chunk("lo"),
        json!({"choices": [{"delta": {}, "finish_reason": "stop"}]}),
        chunk("!")
    );
    Mock::given(method("POST"))
        .and(path("/openai/v1/chat/completions"))
        .and(body_partial_json(json!({"stream": true, "max_tokens": 64})))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let provider = provider_for(&server);
    let params = CompletionParams {
        temperature: None,
        max_tokens: Some(64),
    };
    let deltas: Vec<String> = provider
        .stream_complete(&[Message::user("hello")], params)
        .await
        .unwrap()
        .map(|d| d.unwrap())
        .collect()
        .await;

    assert_eq!(deltas, vec!["Hel", "lo", "!"]);
}

#[tokio::test]
async fn test_stream_open_failure_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid key"))
        .mount(&server)
        .await;

    let provider = provider_for(&server);
    let result = provider
        .stream_complete(&[Message::user("hello")], CompletionParams::default())
        .await;
    assert!(result.is_err());
}
