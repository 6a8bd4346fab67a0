// Unit tests for Anthropic driver

use futures::StreamExt;
use scrivener_core::config::{ProviderConfig, ProviderKind};
use scrivener_core::driver::{Fragment, TranslationDriver, TranslationRequest};
use scrivener_core::error::TranslateError;
use wiremock::matchers::{body_partial_json, header, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::driver::parse_event;
use crate::AnthropicTranslationDriver;

fn request() -> TranslationRequest {
    TranslationRequest {
        unit: "novel/chapter-1".to_string(),
        system_prompt: "Translate Korean to English.".to_string(),
        user_prompt: "안녕하세요".to_string(),
    }
}

fn sse(events: &[(&str, &str)]) -> ResponseTemplate {
    let body: String = events
        .iter()
        .map(|(event, data)| format!("event: {event}\ndata: {data}\n\n"))
        .collect();
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/event-stream")
        .set_body_string(body)
}

#[test]
fn test_driver_with_api_key() {
    let driver = AnthropicTranslationDriver::new("test-key");
    // Just verify it can be created
    assert!(format!("{:?}", driver).contains("AnthropicTranslationDriver"));
    assert!(!format!("{:?}", driver).contains("test-key"));
}

#[test]
fn test_driver_with_base_url() {
    let driver =
        AnthropicTranslationDriver::with_base_url("test-key", "https://custom.api.com/v1/messages");
    assert_eq!(driver.api_url(), "https://custom.api.com/v1/messages");
}

#[test]
fn test_from_config() {
    let config = ProviderConfig::new(ProviderKind::Anthropic);
    assert!(AnthropicTranslationDriver::from_config(&config).is_err());

    let driver =
        AnthropicTranslationDriver::from_config(&config.with_api_key("sk-ant-test")).unwrap();
    assert_eq!(driver.settings().max_tokens, Some(8192));
}

#[test]
fn test_parse_event() {
    match parse_event(
        "content_block_delta",
        r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Hi"}}"#,
    ) {
        Some(Ok(Fragment::Delta(text))) => assert_eq!(text, "Hi"),
        other => panic!("unexpected: {other:?}"),
    }

    assert!(parse_event(
        "content_block_delta",
        r#"{"type":"content_block_delta","index":0,"delta":{"type":"thinking_delta","thinking":"..."}}"#,
    )
    .is_none());
    assert!(matches!(
        parse_event("content_block_delta", "{broken"),
        Some(Ok(Fragment::Malformed { .. }))
    ));
    assert!(parse_event("ping", r#"{"type":"ping"}"#).is_none());
    assert!(matches!(
        parse_event("message_stop", r#"{"type":"message_stop"}"#),
        Some(Ok(Fragment::End))
    ));
    assert!(matches!(
        parse_event("error", r#"{"type":"error","error":{"type":"overloaded_error"}}"#),
        Some(Err(TranslateError::TransientNetworkFailure(_)))
    ));
}

#[tokio::test]
async fn test_stream_collects_text_deltas() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("x-api-key", "test-key"))
        .and(header("anthropic-version", "2023-06-01"))
        .and(body_partial_json(serde_json::json!({
            "stream": true,
            "system": "Translate Korean to English."
        })))
        .respond_with(sse(&[
            ("message_start", r#"{"type":"message_start","message":{"id":"msg_1"}}"#),
            ("content_block_start", r#"{"type":"content_block_start","index":0,"content_block":{"type":"text","text":""}}"#),
            ("ping", r#"{"type":"ping"}"#),
            ("content_block_delta", r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Hello"}}"#),
            ("content_block_delta", r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":" there"}}"#),
            ("content_block_stop", r#"{"type":"content_block_stop","index":0}"#),
            ("message_delta", r#"{"type":"message_delta","delta":{"stop_reason":"end_turn"}}"#),
            ("message_stop", r#"{"type":"message_stop"}"#),
        ]))
        .expect(1)
        .mount(&server)
        .await;

    let driver = AnthropicTranslationDriver::with_base_url("test-key", server.uri());
    let fragments: Vec<Fragment> = driver
        .stream(&request())
        .await
        .unwrap()
        .map(|f| f.unwrap())
        .collect()
        .await;

    assert_eq!(
        fragments,
        vec![
            Fragment::Delta("Hello".to_string()),
            Fragment::Delta(" there".to_string()),
            Fragment::End,
        ]
    );
}

#[tokio::test]
async fn test_overloaded_status_is_transient() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(529).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let driver = AnthropicTranslationDriver::with_base_url("test-key", server.uri());
    let err = driver.stream(&request()).await.err().unwrap();

    assert!(matches!(err, TranslateError::Backend { status: 529, .. }));
    assert!(err.is_transient());
}
