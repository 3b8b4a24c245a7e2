#![allow(clippy::must_use_candidate)]

pub mod auth;
mod env;
pub mod health;
pub mod llm;
mod loader;
pub mod server;
pub mod telemetry;

use serde::Deserialize;

pub use auth::*;
pub use health::*;
pub use llm::*;
pub use server::*;
pub use telemetry::{LogFormat, TelemetryConfig};

/// Top-level Axon configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Upstream provider and prompt configuration
    #[serde(default)]
    pub llm: LlmConfig,
    /// Telemetry configuration
    #[serde(default)]
    pub telemetry: Option<TelemetryConfig>,
}
