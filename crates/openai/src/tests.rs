// Unit tests for OpenAI driver

use futures::StreamExt;
use scrivener_core::config::{ProviderConfig, ProviderKind};
use scrivener_core::driver::{Fragment, TranslationDriver, TranslationRequest};
use scrivener_core::error::TranslateError;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::driver::parse_chunk;
use crate::OpenAITranslationDriver;

fn request() -> TranslationRequest {
    TranslationRequest {
        unit: "novel/chapter-1".to_string(),
        system_prompt: "Translate Korean to English.".to_string(),
        user_prompt: "안녕하세요".to_string(),
    }
}

fn sse(events: &[&str]) -> ResponseTemplate {
    let body: String = events.iter().map(|e| format!("data: {e}\n\n")).collect();
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/event-stream")
        .set_body_string(body)
}

#[test]
fn test_driver_with_api_key() {
    let driver = OpenAITranslationDriver::new("test-key");
    // Just verify it can be created
    assert!(format!("{:?}", driver).contains("OpenAITranslationDriver"));
    assert!(!format!("{:?}", driver).contains("test-key"));
}

#[test]
fn test_driver_with_base_url() {
    let driver =
        OpenAITranslationDriver::with_base_url("test-key", "https://custom.api.com/v1/completions");
    assert_eq!(driver.api_url(), "https://custom.api.com/v1/completions");
}

#[test]
fn test_from_config_requires_key() {
    let config = ProviderConfig::new(ProviderKind::OpenAI);
    assert!(matches!(
        OpenAITranslationDriver::from_config(&config),
        Err(TranslateError::InvalidConfiguration(_))
    ));

    let config = config.with_api_key("sk-test").with_model("gpt-4.1");
    let driver = OpenAITranslationDriver::from_config(&config).unwrap();
    assert_eq!(driver.settings().model, "gpt-4.1");
    assert_eq!(driver.api_url(), crate::DEFAULT_API_URL);
}

#[test]
fn test_parse_chunk() {
    assert!(matches!(parse_chunk("[DONE]"), Some(Ok(Fragment::End))));
    assert!(parse_chunk(r#"{"choices":[{"delta":{"role":"assistant"}}]}"#).is_none());
    assert!(parse_chunk(r#"{"choices":[{"delta":{},"finish_reason":"stop"}]}"#).is_none());

    match parse_chunk(r#"{"choices":[{"delta":{"content":"Hello"}}]}"#) {
        Some(Ok(Fragment::Delta(text))) => assert_eq!(text, "Hello"),
        other => panic!("unexpected: {other:?}"),
    }
    match parse_chunk("{not json") {
        Some(Ok(Fragment::Malformed { raw, .. })) => assert_eq!(raw, "{not json"),
        other => panic!("unexpected: {other:?}"),
    }
    assert!(matches!(
        parse_chunk(r#"{"error":{"message":"server overloaded"}}"#),
        Some(Err(TranslateError::TransientNetworkFailure(_)))
    ));
}

#[tokio::test]
async fn test_stream_collects_deltas() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(serde_json::json!({ "stream": true, "model": "gpt-4o" })))
        .respond_with(sse(&[
            r#"{"choices":[{"delta":{"role":"assistant"}}]}"#,
            r#"{"choices":[{"delta":{"content":"Hello"}}]}"#,
            "garbage",
            r#"{"choices":[{"delta":{"content":", world"}}]}"#,
            "[DONE]",
        ]))
        .expect(1)
        .mount(&server)
        .await;

    let driver = OpenAITranslationDriver::with_base_url(
        "test-key",
        format!("{}/v1/chat/completions", server.uri()),
    );
    let stream = driver.stream(&request()).await.unwrap();
    let fragments: Vec<Fragment> = stream.map(|f| f.unwrap()).collect().await;

    assert_eq!(fragments.len(), 4);
    assert_eq!(fragments[0], Fragment::Delta("Hello".to_string()));
    assert!(matches!(fragments[1], Fragment::Malformed { .. }));
    assert_eq!(fragments[2], Fragment::Delta(", world".to_string()));
    assert_eq!(fragments[3], Fragment::End);
}

#[tokio::test]
async fn test_error_status_maps_to_backend_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
        .mount(&server)
        .await;

    let driver = OpenAITranslationDriver::with_base_url("bad-key", server.uri());
    let err = driver.stream(&request()).await.err().unwrap();

    match &err {
        TranslateError::Backend { status, body } => {
            assert_eq!(*status, 401);
            assert_eq!(body, "invalid api key");
        }
        other => panic!("unexpected: {other:?}"),
    }
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_connection_failure_is_transient() {
    // Nothing listens on port 9 on loopback
    let driver = OpenAITranslationDriver::with_base_url("test-key", "http://127.0.0.1:9/v1");
    let err = driver.stream(&request()).await.err().unwrap();
    assert!(matches!(err, TranslateError::TransientNetworkFailure(_)));
    assert!(err.is_transient());
}
