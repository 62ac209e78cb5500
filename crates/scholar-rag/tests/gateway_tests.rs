//! LLM gateway against an in-process stub of the chat API

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use scholar_rag::config::LlmConfig;
use scholar_rag::error::Error;
use scholar_rag::generation::{LlmGateway, RetryPolicy};
use scholar_rag::providers::{LlmProvider, Prompt};

/// Fails the first `failures` calls with `status`, then answers
#[derive(Clone)]
struct Stub {
    calls: Arc<AtomicU32>,
    failures: u32,
    status: StatusCode,
    error_body: Value,
}

async fn chat(State(stub): State<Stub>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    let call = stub.calls.fetch_add(1, Ordering::SeqCst) + 1;
    assert_eq!(
        headers.get("authorization").and_then(|v| v.to_str().ok()),
        Some("Bearer test-key")
    );
    assert_eq!(body["stream"], json!(false));

    if call <= stub.failures {
        return (stub.status, [("retry-after", "0")], Json(stub.error_body.clone())).into_response();
    }
    Json(json!({
        "choices": [{ "message": { "role": "assistant", "content": "Grounded answer [1]." } }],
        "usage": { "prompt_tokens": 50, "completion_tokens": 5, "total_tokens": 55 }
    }))
    .into_response()
}

async fn spawn_stub(failures: u32, status: StatusCode, error_body: Value) -> (String, Arc<AtomicU32>) {
    let calls = Arc::new(AtomicU32::new(0));
    let stub = Stub {
        calls: Arc::clone(&calls),
        failures,
        status,
        error_body,
    };
    let app = Router::new().route("/v1/chat/completions", post(chat)).with_state(stub);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}/v1", addr), calls)
}

fn gateway(base_url: &str, max_attempts: u32) -> LlmGateway {
    let config = LlmConfig {
        base_url: base_url.to_string(),
        api_key: "test-key".to_string(),
        timeout_secs: 5,
        ..LlmConfig::default()
    };
    let policy = RetryPolicy {
        max_attempts,
        base_delay: Duration::from_millis(5),
        max_delay: Duration::from_millis(20),
    };
    LlmGateway::with_policy(&config, policy).unwrap()
}

fn rate_limited() -> Value {
    json!({ "error": { "message": "Rate limit reached", "type": "rate_limit_error" } })
}

#[tokio::test]
async fn rate_limits_are_retried_until_success() {
    let (url, calls) = spawn_stub(3, StatusCode::TOO_MANY_REQUESTS, rate_limited()).await;
    let gateway = gateway(&url, 4);

    let completion = gateway.complete(&Prompt::new("system", "question")).await.unwrap();
    assert_eq!(completion.text, "Grounded answer [1].");
    assert_eq!(completion.attempts, 4);
    assert!(completion.attempts <= 4);
    assert_eq!(completion.usage.unwrap().total_tokens, 55);
    assert_eq!(calls.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn transient_failures_stop_at_max_attempts() {
    let (url, calls) = spawn_stub(10, StatusCode::SERVICE_UNAVAILABLE, json!({})).await;
    let gateway = gateway(&url, 3);

    let err = gateway.complete(&Prompt::new("system", "question")).await.unwrap_err();
    assert!(matches!(err, Error::GatewayTransient(_)));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn auth_and_quota_errors_are_not_retried() {
    let (url, calls) = spawn_stub(
        10,
        StatusCode::UNAUTHORIZED,
        json!({ "error": { "message": "Invalid API key", "type": "invalid_request_error" } }),
    )
    .await;
    let err = gateway(&url, 4)
        .complete(&Prompt::new("system", "question"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::GatewayFatal(_)));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let (url, calls) = spawn_stub(
        10,
        StatusCode::TOO_MANY_REQUESTS,
        json!({ "error": { "message": "You exceeded your current quota", "type": "insufficient_quota", "code": "insufficient_quota" } }),
    )
    .await;
    let err = gateway(&url, 4)
        .complete(&Prompt::new("system", "question"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::GatewayFatal(_)));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}
