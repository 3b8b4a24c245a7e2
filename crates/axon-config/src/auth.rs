use secrecy::SecretString;
use serde::Deserialize;

/// Shared-key authentication for inbound requests
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    /// Whether requests must present the key
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Expected key value
    pub api_key: SecretString,
    /// Header carrying the key
    #[serde(default = "default_header_name")]
    pub header_name: String,
    /// Path prefixes that skip authentication
    #[serde(default)]
    pub public_paths: Vec<String>,
}

#[allow(clippy::missing_const_for_fn)]
fn default_enabled() -> bool {
    true
}

fn default_header_name() -> String {
    "x-api-key".to_string()
}
