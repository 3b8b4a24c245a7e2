use std::path::PathBuf;

use http::StatusCode;
use thiserror::Error;

/// Trait for domain errors that can be converted to HTTP responses
///
/// The handler layer turns these into OpenAI-style error bodies, keeping
/// the pipeline itself decoupled from axum.
pub trait HttpError: std::error::Error {
    /// HTTP status code for this error
    fn status_code(&self) -> StatusCode;

    /// Machine-readable error type (e.g. `invalid_request_error`)
    fn error_type(&self) -> &str;

    /// Message safe to expose to API consumers
    fn client_message(&self) -> String;
}

/// Errors raised while talking to the upstream provider
#[derive(Debug, Error)]
pub enum LlmError {
    /// Upstream provider returned an error
    #[error("upstream error: {0}")]
    Upstream(String),

    /// Error during streaming response
    #[error("streaming error: {0}")]
    Streaming(String),

    /// Client sent a malformed or invalid request
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Unexpected internal error
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Failures turning model output into a typed action
///
/// Each variant carries enough of the offending text to diagnose the
/// failure from logs alone.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// No tier produced a usable payload and the text is not plain prose,
    /// or a stream ended inside an unterminated block
    #[error("malformed model response")]
    MalformedResponse {
        /// Full text the model produced
        raw: String,
        /// Last payload candidate that failed to decode
        candidate: Option<String>,
    },

    /// A `<tool_call>` block could not be decoded as XML
    #[error("invalid tool call XML: {reason}")]
    InvalidXml {
        /// Parser failure description
        reason: String,
        /// The block that was being decoded
        payload: String,
    },

    /// Decoded `action` is neither `text_message` nor `tool_call`
    #[error("invalid action: {action}")]
    InvalidAction {
        /// The value found in the `action` field
        action: String,
    },

    /// None of the action data paths exist
    #[error("missing action data (tried {})", .tried.join(", "))]
    MissingActionData {
        /// Paths attempted, in order
        tried: Vec<String>,
    },

    /// A tool call payload lacks a usable name or arguments
    #[error("missing tool data (tried {})", .tried.join(", "))]
    MissingToolData {
        /// Paths attempted, in order
        tried: Vec<String>,
    },

    /// A text message payload lacks its message
    #[error("missing message (tried {})", .tried.join(", "))]
    MissingMessage {
        /// Paths attempted, in order
        tried: Vec<String>,
    },
}

/// The single error a translated request fails with
#[derive(Debug, Error)]
pub enum AdapterError {
    /// The instruction template could not be read
    #[error("failed to load prompt template {}: {source}", .path.display())]
    TemplateLoad {
        /// Template location
        path: PathBuf,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },

    /// The upstream provider call failed
    #[error(transparent)]
    Provider(#[from] LlmError),

    /// The model output could not be resolved
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// Request lacks valid credentials
    #[error("authentication required")]
    Unauthorized,
}

impl HttpError for LlmError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Streaming(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn error_type(&self) -> &str {
        match self {
            Self::Upstream(_) => "upstream_error",
            Self::Streaming(_) => "streaming_error",
            Self::InvalidRequest(_) => "invalid_request_error",
            Self::Internal(_) => "internal_error",
        }
    }

    fn client_message(&self) -> String {
        match self {
            Self::Internal(_) => "an internal error occurred".to_owned(),
            other => other.to_string(),
        }
    }
}

impl HttpError for ResolveError {
    fn status_code(&self) -> StatusCode {
        StatusCode::BAD_GATEWAY
    }

    fn error_type(&self) -> &str {
        match self {
            Self::MalformedResponse { .. } | Self::InvalidXml { .. } => "malformed_response_error",
            Self::InvalidAction { .. } => "invalid_action_error",
            Self::MissingActionData { .. } => "missing_action_data_error",
            Self::MissingToolData { .. } => "missing_tool_data_error",
            Self::MissingMessage { .. } => "missing_message_error",
        }
    }

    fn client_message(&self) -> String {
        self.to_string()
    }
}

impl HttpError for AdapterError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::TemplateLoad { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Provider(e) => e.status_code(),
            Self::Resolve(e) => e.status_code(),
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
        }
    }

    fn error_type(&self) -> &str {
        match self {
            Self::TemplateLoad { .. } => "template_load_error",
            Self::Provider(e) => e.error_type(),
            Self::Resolve(e) => e.error_type(),
            Self::Unauthorized => "authentication_error",
        }
    }

    fn client_message(&self) -> String {
        match self {
            Self::TemplateLoad { .. } => "prompt template unavailable".to_owned(),
            Self::Provider(e) => e.client_message(),
            Self::Resolve(e) => e.client_message(),
            Self::Unauthorized => self.to_string(),
        }
    }
}
