use std::sync::Arc;

use anyhow::Context;
use axon_config::AuthConfig;
use axon_llm::HttpError;
use axon_llm::error::AdapterError;
use axon_llm::protocol::openai::{OpenAiErrorDetail, OpenAiErrorResponse};
use axum::Json;
use axum::extract::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use http::HeaderName;
use secrecy::{ExposeSecret, SecretString};

/// Shared-key check applied to every non-public request
#[derive(Clone)]
pub struct ApiKeyAuth {
    header_name: HeaderName,
    api_key: SecretString,
    public_paths: Arc<[String]>,
}

impl ApiKeyAuth {
    /// Build from config; with no public paths configured only the health
    /// endpoint is public
    ///
    /// # Errors
    ///
    /// Returns an error if the configured header name is not a valid header
    pub fn new(config: &AuthConfig, health_path: &str) -> anyhow::Result<Self> {
        let header_name = HeaderName::try_from(config.header_name.as_str())
            .with_context(|| format!("invalid auth header name {:?}", config.header_name))?;

        let public_paths: Arc<[String]> = if config.public_paths.is_empty() {
            Arc::from([health_path.to_owned()])
        } else {
            config.public_paths.clone().into()
        };

        Ok(Self {
            header_name,
            api_key: config.api_key.clone(),
            public_paths,
        })
    }

    fn is_public(&self, path: &str) -> bool {
        self.public_paths.iter().any(|p| path.starts_with(p.as_str()))
    }

    fn accepts(&self, presented: Option<&[u8]>) -> bool {
        presented.is_some_and(|key| key == self.api_key.expose_secret().as_bytes())
    }
}

/// Reject requests that do not carry the configured key
pub async fn auth_middleware(auth: ApiKeyAuth, request: Request, next: Next) -> Response {
    if auth.is_public(request.uri().path()) {
        return next.run(request).await;
    }

    let presented = request.headers().get(&auth.header_name).map(http::HeaderValue::as_bytes);
    if auth.accepts(presented) {
        return next.run(request).await;
    }

    tracing::warn!(path = %request.uri().path(), "rejected request without valid API key");
    unauthorized()
}

fn unauthorized() -> Response {
    let error = AdapterError::Unauthorized;
    let body = OpenAiErrorResponse {
        error: OpenAiErrorDetail {
            message: error.client_message(),
            error_type: error.error_type().to_owned(),
            code: None,
        },
    };
    (error.status_code(), Json(body)).into_response()
}
