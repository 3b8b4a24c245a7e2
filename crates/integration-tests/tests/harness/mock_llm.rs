//! Mock upstream for integration tests
//!
//! Implements a minimal OpenAI-compatible completions endpoint that replays
//! scripted model output and records the last request it received

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router, routing};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

const ID: &str = "chatcmpl-mock-1";
const CREATED: u64 = 1_700_000_000;

/// Mock upstream that answers with scripted model output
pub struct MockLlm {
    addr: SocketAddr,
    shutdown: CancellationToken,
    state: Arc<MockLlmState>,
}

struct MockLlmState {
    request_count: AtomicU32,
    /// Answer every request with a 500
    failing: bool,
    /// Model output, one stream delta per piece
    pieces: Vec<String>,
    last_request: Mutex<Option<Value>>,
}

impl MockLlm {
    /// Start a mock whose model says `content`
    pub async fn start(content: &str) -> anyhow::Result<Self> {
        Self::start_inner(false, vec![content.to_owned()]).await
    }

    /// Start a mock that streams `pieces` as separate deltas
    ///
    /// Non-streaming requests get the pieces concatenated
    pub async fn start_with_pieces(pieces: &[&str]) -> anyhow::Result<Self> {
        Self::start_inner(false, pieces.iter().map(|&p| p.to_owned()).collect()).await
    }

    /// Start a mock that fails every request with 500
    pub async fn start_failing() -> anyhow::Result<Self> {
        Self::start_inner(true, Vec::new()).await
    }

    async fn start_inner(failing: bool, pieces: Vec<String>) -> anyhow::Result<Self> {
        let state = Arc::new(MockLlmState {
            request_count: AtomicU32::new(0),
            failing,
            pieces,
            last_request: Mutex::new(None),
        });

        let app = Router::new()
            .route("/v1/chat/completions", routing::post(handle_chat_completions))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();
        let shutdown_clone = shutdown.clone();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown_clone.cancelled().await;
                })
                .await
                .ok();
        });

        Ok(Self { addr, shutdown, state })
    }

    /// Base URL for configuring the mock as the upstream
    ///
    /// Includes `/v1` since the provider appends `/chat/completions`
    pub fn base_url(&self) -> String {
        format!("http://{}/v1", self.addr)
    }

    /// Number of completion requests received
    pub fn request_count(&self) -> u32 {
        self.state.request_count.load(Ordering::Relaxed)
    }

    /// The last request body the mock received
    pub fn last_request(&self) -> Value {
        self.state
            .last_request
            .lock()
            .unwrap()
            .clone()
            .expect("mock received no request")
    }
}

impl Drop for MockLlm {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn handle_chat_completions(State(state): State<Arc<MockLlmState>>, Json(req): Json<Value>) -> Response {
    state.request_count.fetch_add(1, Ordering::Relaxed);
    let stream = req["stream"].as_bool().unwrap_or(false);
    let model = req["model"].as_str().unwrap_or_default().to_owned();
    *state.last_request.lock().unwrap() = Some(req);

    if state.failing {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "error": {
                    "message": "mock server intentional failure",
                    "type": "server_error"
                }
            })),
        )
            .into_response();
    }

    if stream {
        return build_streaming_response(&state.pieces, &model).into_response();
    }

    Json(json!({
        "id": ID,
        "object": "chat.completion",
        "created": CREATED,
        "model": model,
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": state.pieces.concat()},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15, "cost": 0.0002}
    }))
    .into_response()
}

fn chunk(model: &str, delta: &Value, finish_reason: Option<&str>) -> Value {
    json!({
        "id": ID,
        "object": "chat.completion.chunk",
        "created": CREATED,
        "model": model,
        "choices": [{"index": 0, "delta": delta, "finish_reason": finish_reason}]
    })
}

/// Build an SSE body with one content delta per piece
fn build_streaming_response(pieces: &[String], model: &str) -> impl IntoResponse {
    let mut events = vec![chunk(model, &json!({"role": "assistant", "content": ""}), None)];
    events.extend(pieces.iter().map(|piece| chunk(model, &json!({"content": piece}), None)));
    events.push(chunk(model, &json!({}), Some("stop")));
    events.push(json!({
        "id": ID,
        "object": "chat.completion.chunk",
        "created": CREATED,
        "model": model,
        "choices": [],
        "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
    }));

    let mut body = String::new();
    for event in events {
        body.push_str(&format!("data: {event}\n\n"));
    }
    body.push_str("data: [DONE]\n\n");

    (
        StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "text/event-stream")],
        body,
    )
}
