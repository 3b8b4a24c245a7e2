use std::path::PathBuf;

use secrecy::SecretString;
use serde::Deserialize;
use url::Url;

/// Default upstream base URL (`OpenRouter`)
pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Upstream provider and prompt configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LlmConfig {
    /// OpenAI-compatible upstream provider
    #[serde(default)]
    pub provider: ProviderConfig,
    /// System prompt injection settings
    #[serde(default)]
    pub prompt: PromptConfig,
}

/// Configuration for the OpenAI-compatible upstream
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// API key sent as a bearer token
    #[serde(default)]
    pub api_key: Option<SecretString>,
    /// Base URL override, defaults to [`DEFAULT_BASE_URL`]
    #[serde(default)]
    pub base_url: Option<Url>,
    /// Request timeout in seconds
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
}

/// System prompt injection settings
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PromptConfig {
    /// Path to the instruction template containing a `{{tools}}` placeholder
    #[serde(default = "default_template_path")]
    pub template_path: PathBuf,
    /// Role that rewritten tool results are sent under
    #[serde(default)]
    pub tool_result_role: ToolResultRole,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            template_path: default_template_path(),
            tool_result_role: ToolResultRole::default(),
        }
    }
}

/// Role accepted by the upstream for tool results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolResultRole {
    /// Send tool results as user messages
    #[default]
    User,
    /// Send tool results as system messages
    System,
}

fn default_template_path() -> PathBuf {
    PathBuf::from("prompts/instructions.md")
}
