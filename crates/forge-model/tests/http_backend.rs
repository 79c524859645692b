//! OpenAI-compatible backend against an in-process server

use forge_model::{
    BackendConfig, GenerationBackend, GenerationError, GenerationPort, GenerationRequest,
    InvokeOptions, OpenAiCompatibleBackend, RetryPolicy,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use warp::http::StatusCode;
use warp::Filter;

/// Authorization header and JSON body of the most recent request
type Captured = Mutex<Option<(Option<String>, Value)>>;

struct Served {
    base_url: String,
    hits: Arc<AtomicUsize>,
    last_request: Arc<Captured>,
}

/// Serve `replies` in order, repeating the last one
fn serve(replies: Vec<(StatusCode, Value)>) -> Served {
    let hits = Arc::new(AtomicUsize::new(0));
    let last_request: Arc<Captured> = Arc::default();
    let replies = Arc::new(replies);

    let route = {
        let hits = hits.clone();
        let last_request = last_request.clone();
        warp::post()
            .and(warp::path!("v1" / "chat" / "completions"))
            .and(warp::header::optional::<String>("authorization"))
            .and(warp::body::json())
            .map(move |auth: Option<String>, body: Value| {
                let n = hits.fetch_add(1, Ordering::SeqCst);
                *last_request.lock().unwrap() = Some((auth, body));
                let (status, reply) = replies[n.min(replies.len() - 1)].clone();
                warp::reply::with_status(warp::reply::json(&reply), status)
            })
    };

    let (addr, server) = warp::serve(route).bind_ephemeral(([127, 0, 0, 1], 0));
    tokio::spawn(server);
    Served {
        base_url: format!("http://{addr}/v1"),
        hits,
        last_request,
    }
}

fn completion(text: &str) -> Value {
    json!({ "choices": [{ "message": { "role": "assistant", "content": text }, "finish_reason": "stop" }] })
}

fn backend(served: &Served) -> OpenAiCompatibleBackend {
    OpenAiCompatibleBackend::new(
        BackendConfig::default()
            .with_base_url(&served.base_url)
            .with_model("test-model")
            .with_api_key("sk-test"),
    )
    .unwrap()
}

#[tokio::test]
async fn sends_chat_request_and_returns_text() {
    let served = serve(vec![(StatusCode::OK, completion("{\"name\": \"Calc\"}"))]);
    let request = GenerationRequest {
        prompt: "build a calculator".into(),
        max_tokens: 256,
        temperature: 0.2,
    };

    let response = backend(&served).generate(request).await.unwrap();
    assert_eq!(response.text, "{\"name\": \"Calc\"}");

    let (auth, body) = served.last_request.lock().unwrap().take().unwrap();
    assert_eq!(auth.as_deref(), Some("Bearer sk-test"));
    assert_eq!(body["model"], "test-model");
    assert_eq!(body["max_tokens"], 256);
    assert_eq!(body["messages"][0]["role"], "user");
    assert_eq!(body["messages"][0]["content"], "build a calculator");
}

#[tokio::test]
async fn service_unavailable_is_transient() {
    let served = serve(vec![(StatusCode::SERVICE_UNAVAILABLE, json!({ "error": "overloaded" }))]);
    let err = backend(&served)
        .generate(GenerationRequest::new("x"))
        .await
        .unwrap_err();
    assert!(err.is_retryable(), "{err}");
}

#[tokio::test]
async fn content_filter_is_a_rejection() {
    let served = serve(vec![(
        StatusCode::OK,
        json!({ "choices": [{ "message": { "content": "" }, "finish_reason": "content_filter" }] }),
    )]);
    let err = backend(&served)
        .generate(GenerationRequest::new("x"))
        .await
        .unwrap_err();
    assert!(matches!(err, GenerationError::Rejected(_)));
}

#[tokio::test]
async fn bad_request_is_a_rejection() {
    let served = serve(vec![(StatusCode::BAD_REQUEST, json!({ "error": "content policy violation" }))]);
    let err = backend(&served)
        .generate(GenerationRequest::new("x"))
        .await
        .unwrap_err();
    assert!(matches!(err, GenerationError::Rejected(_)));
}

#[tokio::test]
async fn empty_choices_are_transient() {
    let served = serve(vec![(StatusCode::OK, json!({ "choices": [] }))]);
    let err = backend(&served)
        .generate(GenerationRequest::new("x"))
        .await
        .unwrap_err();
    assert!(matches!(err, GenerationError::Unavailable(_)));
}

#[tokio::test]
async fn port_retries_rate_limit_then_succeeds() {
    let served = serve(vec![
        (StatusCode::TOO_MANY_REQUESTS, json!({ "error": "rate limited" })),
        (StatusCode::OK, completion("done")),
    ]);
    let port = GenerationPort::new(Arc::new(backend(&served)))
        .with_retry_policy(RetryPolicy::immediate());

    let raw = port.invoke("x", InvokeOptions::default()).await.unwrap();
    assert_eq!(raw.as_str(), "done");
    assert_eq!(served.hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn unreachable_service_is_unavailable() {
    let backend = OpenAiCompatibleBackend::new(
        BackendConfig::default().with_base_url("http://127.0.0.1:1/v1"),
    )
    .unwrap();
    let err = backend.generate(GenerationRequest::new("x")).await.unwrap_err();
    assert!(matches!(err, GenerationError::Unavailable(_)));
}
