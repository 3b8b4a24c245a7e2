//! Axum route handlers for the OpenAI-compatible endpoint

use std::convert::Infallible;

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router, routing};
use futures_util::{Stream, StreamExt, stream};

use crate::error::{AdapterError, HttpError, LlmError};
use crate::protocol::openai::{
    OpenAiErrorDetail, OpenAiErrorResponse, OpenAiRequest, OpenAiResponse, OpenAiStreamChunk,
};
use crate::state::{LlmState, PendingStream};
use crate::types::CompletionRequest;

/// Build the LLM router
pub fn llm_router(state: LlmState) -> Router {
    Router::new()
        .route("/v1/chat/completions", routing::post(openai_chat_completions))
        .with_state(state)
}

/// Handle `POST /v1/chat/completions`
async fn openai_chat_completions(
    State(state): State<LlmState>,
    body: Result<Json<OpenAiRequest>, JsonRejection>,
) -> Response {
    let wire_request = match body {
        Ok(Json(wire_request)) => wire_request,
        Err(rejection) => {
            return error_response(&LlmError::InvalidRequest(rejection.body_text()));
        }
    };

    if wire_request.model.trim().is_empty() {
        return error_response(&LlmError::InvalidRequest("model must not be empty".to_owned()));
    }

    let request = CompletionRequest::from(wire_request);

    if request.stream {
        match state.complete_stream(request).await {
            Ok(pending) => openai_stream_response(pending).into_response(),
            Err(e) => adapter_error_response(&e),
        }
    } else {
        match state.complete(request).await {
            Ok(response) => Json(OpenAiResponse::from(response)).into_response(),
            Err(e) => adapter_error_response(&e),
        }
    }
}

/// Build the SSE response for a stream that is still being reduced
///
/// Nothing but keep-alives is sent until the upstream stream finishes.
/// The body then carries the resolved chunk, an optional usage chunk and
/// `[DONE]`, or an error event followed by `[DONE]`.
fn openai_stream_response(pending: PendingStream) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let events = stream::once(pending.finish()).flat_map(|result| {
        let mut events: Vec<Event> = match result {
            Ok(chunks) => chunks
                .into_iter()
                .map(|chunk| {
                    let data = serde_json::to_string(&OpenAiStreamChunk::from(chunk)).unwrap_or_default();
                    Event::default().data(data)
                })
                .collect(),
            Err(e) => {
                tracing::warn!(error = %e, "streaming completion failed");
                let data = serde_json::to_string(&error_body(&e)).unwrap_or_default();
                vec![Event::default().data(data)]
            }
        };
        events.push(Event::default().data("[DONE]"));
        stream::iter(events.into_iter().map(Ok))
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}

fn error_body(error: &impl HttpError) -> OpenAiErrorResponse {
    OpenAiErrorResponse {
        error: OpenAiErrorDetail {
            message: error.client_message(),
            error_type: error.error_type().to_owned(),
            code: None,
        },
    }
}

/// Convert an error to an `OpenAI`-style JSON error response
fn error_response(error: &impl HttpError) -> Response {
    (error.status_code(), Json(error_body(error))).into_response()
}

fn adapter_error_response(error: &AdapterError) -> Response {
    if error.status_code().is_server_error() {
        tracing::warn!(error = %error, "completion failed");
    }
    error_response(error)
}
