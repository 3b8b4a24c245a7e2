//! Programmatic configuration builder for integration tests

use std::net::SocketAddr;
use std::path::PathBuf;

use axon_config::{AuthConfig, Config, HealthConfig, ServerConfig, ToolResultRole};
use secrecy::SecretString;

/// Builder for constructing test configurations
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a builder pointed at a mock upstream, using the shipped prompt
    pub fn new(base_url: &str) -> Self {
        let mut config = Config {
            server: ServerConfig {
                listen_address: Some(SocketAddr::from(([127, 0, 0, 1], 0))),
                health: HealthConfig::default(),
                auth: None,
            },
            ..Config::default()
        };

        config.llm.provider.api_key = Some(SecretString::from("test-key"));
        config.llm.provider.base_url = Some(base_url.parse().expect("valid URL"));
        config.llm.provider.timeout_seconds = Some(10);
        config.llm.prompt.template_path =
            PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/../../prompts/instructions.md"));

        Self { config }
    }

    /// Read the prompt template from another path
    pub fn with_template_path(mut self, path: &str) -> Self {
        self.config.llm.prompt.template_path = PathBuf::from(path);
        self
    }

    /// Send rewritten tool results under another role
    pub fn with_tool_result_role(mut self, role: ToolResultRole) -> Self {
        self.config.llm.prompt.tool_result_role = role;
        self
    }

    /// Require an API key in the `x-api-key` header
    pub fn with_auth(mut self, api_key: &str) -> Self {
        self.config.server.auth = Some(AuthConfig {
            enabled: true,
            api_key: SecretString::from(api_key),
            header_name: "x-api-key".to_owned(),
            public_paths: Vec::new(),
        });
        self
    }

    /// Disable health endpoint
    pub fn without_health(mut self) -> Self {
        self.config.server.health.enabled = false;
        self
    }

    /// Build the final config
    pub fn build(self) -> Config {
        self.config
    }
}
