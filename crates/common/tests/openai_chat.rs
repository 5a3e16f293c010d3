//! Chat-completion client against a mock HTTP server

use provato_common::config::LlmConfig;
use provato_common::llm::{CompletionModel, LanguageGateway, OpenAiChat, FALLBACK_ANSWER};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(server: &MockServer) -> LlmConfig {
    LlmConfig {
        api_key: Some("test-key".into()),
        base_url: format!("{}/v1", server.uri()),
        timeout_secs: 5,
        ..LlmConfig::default()
    }
}

#[tokio::test]
async fn sends_single_user_message_and_trims_reply() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(json!({
            "model": "gpt-4o-mini",
            "temperature": 0.2,
            "messages": [{"role": "user", "content": "hello"}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "  Green Farm.\n"}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = OpenAiChat::new(&config(&server)).unwrap();
    assert_eq!(client.complete("hello").await.unwrap(), "Green Farm.");
}

#[tokio::test]
async fn http_error_becomes_fallback_answer() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
        .mount(&server)
        .await;

    let client = OpenAiChat::new(&config(&server)).unwrap();
    let err = client.complete("hello").await.unwrap_err();
    assert!(err.to_string().contains("500"));

    let gateway = LanguageGateway::new(Arc::new(client), 8);
    let answer = gateway.answer("Where is S123?", "", &[]).await;
    assert_eq!(answer.answer, FALLBACK_ANSWER);
    assert_eq!(answer.source, "openai");
    assert!(answer.is_fallback());
}

#[tokio::test]
async fn malformed_body_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .mount(&server)
        .await;

    let client = OpenAiChat::new(&config(&server)).unwrap();
    assert!(client.complete("hello").await.is_err());

    let gateway = LanguageGateway::new(Arc::new(client), 8);
    assert!(gateway.extract_search_plan("list farms").await.cypher.is_none());
}
