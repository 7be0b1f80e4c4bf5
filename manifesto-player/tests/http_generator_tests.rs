//! HTTP generation client against a stub service

mod helpers;

use helpers::{StubResponse, StubServer};
use manifesto_player::generation::{
    GenerationError, GenerationRequest, HttpGenerator, SegmentGenerator,
};
use manifesto_player::SessionParams;
use serde_json::json;
use std::time::Duration;

fn request(history: &[&str]) -> GenerationRequest {
    GenerationRequest {
        epoch: 3,
        params: SessionParams {
            name: "Ada".to_string(),
            context: "finish the engine. Additional context about me: I hate deadlines".to_string(),
            persona: "Steve Jobs".to_string(),
        },
        history: history.iter().map(|s| s.to_string()).collect(),
    }
}

fn client(server: &StubServer) -> HttpGenerator {
    HttpGenerator::new(server.endpoint(), Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn test_success_returns_payload_and_script() {
    let server = StubServer::start(vec![StubResponse::json(
        200,
        json!({ "url": "data:audio/wav;base64,UklGRg==", "script": "Stay hungry." }),
    )])
    .await;

    let segment = client(&server)
        .generate(&request(&["first", "second"]))
        .await
        .unwrap();
    assert_eq!(segment.payload.as_str(), "data:audio/wav;base64,UklGRg==");
    assert_eq!(segment.script_text, "Stay hungry.");

    let sent = server.requests();
    assert_eq!(sent.len(), 1);
    assert_eq!(
        sent[0],
        json!({
            "name": "Ada",
            "context": "finish the engine. Additional context about me: I hate deadlines",
            "persona": "Steve Jobs",
            "previousScripts": ["first", "second"],
        })
    );
}

#[tokio::test]
async fn test_first_call_sends_empty_history() {
    let server = StubServer::start(vec![StubResponse::json(
        200,
        json!({ "url": "https://cdn.example/1.wav", "script": "Go." }),
    )])
    .await;

    client(&server).generate(&request(&[])).await.unwrap();
    assert_eq!(server.requests()[0]["previousScripts"], json!([]));
}

#[tokio::test]
async fn test_service_error_carries_status_and_message() {
    let server = StubServer::start(vec![StubResponse::json(
        500,
        json!({ "error": "Missing API Keys (OpenRouter or Inworld)" }),
    )])
    .await;

    let err = client(&server).generate(&request(&[])).await.unwrap_err();
    match err {
        GenerationError::Service { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message, "Missing API Keys (OpenRouter or Inworld)");
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[tokio::test]
async fn test_error_status_without_json_body() {
    let server = StubServer::start(vec![StubResponse::raw(503, "upstream down")]).await;

    let err = client(&server).generate(&request(&[])).await.unwrap_err();
    assert!(matches!(err, GenerationError::Service { status: 503, .. }));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_malformed_or_empty_body_is_invalid_response() {
    let server = StubServer::start(vec![
        StubResponse::raw(200, "<html>not json</html>"),
        StubResponse::json(200, json!({ "url": "", "script": "text" })),
    ])
    .await;
    let client = client(&server);

    let err = client.generate(&request(&[])).await.unwrap_err();
    assert!(matches!(err, GenerationError::InvalidResponse(_)));
    assert!(!err.is_retryable());

    let err = client.generate(&request(&[])).await.unwrap_err();
    assert!(matches!(err, GenerationError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_slow_service_times_out() {
    let server = StubServer::start(vec![StubResponse::json(
        200,
        json!({ "url": "https://cdn.example/1.wav", "script": "late" }),
    )
    .delayed(Duration::from_secs(5))])
    .await;

    let client = HttpGenerator::new(server.endpoint(), Duration::from_millis(200)).unwrap();
    let err = client.generate(&request(&[])).await.unwrap_err();
    assert!(matches!(err, GenerationError::Timeout(_)));
}

#[tokio::test]
async fn test_unreachable_service_is_network_error() {
    // Bind then drop to get a port nobody listens on
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = HttpGenerator::new(format!("http://{}/api/generate", addr), Duration::from_secs(2))
        .unwrap();
    let err = client.generate(&request(&[])).await.unwrap_err();
    assert!(matches!(err, GenerationError::Network(_)));
}
