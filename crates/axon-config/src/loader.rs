use std::path::Path;

use secrecy::ExposeSecret;

use crate::Config;

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Reads the file, expands `{{ env.VAR }}` placeholders, then
    /// deserializes and validates the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, environment variable
    /// expansion fails, TOML parsing fails, or validation fails
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;

        Self::parse(&raw)
    }

    /// Parse and validate configuration from TOML text
    ///
    /// # Errors
    ///
    /// Returns an error if expansion, parsing, or validation fails
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        let expanded =
            crate::env::expand_env(raw).map_err(|e| anyhow::anyhow!("config variable expansion failed: {e}"))?;

        let config: Self = toml::from_str(&expanded).map_err(|e| anyhow::anyhow!("failed to parse config: {e}"))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate that the configuration is internally consistent
    ///
    /// # Errors
    ///
    /// Returns an error if the provider, prompt, auth, or telemetry
    /// sections hold unusable values
    pub fn validate(&self) -> anyhow::Result<()> {
        self.validate_provider_config()?;
        self.validate_prompt_config()?;
        self.validate_auth_config()?;
        self.validate_telemetry_config()?;
        Ok(())
    }

    fn validate_provider_config(&self) -> anyhow::Result<()> {
        if let Some(ref base_url) = self.llm.provider.base_url
            && !matches!(base_url.scheme(), "http" | "https")
        {
            anyhow::bail!("llm.provider.base_url must use http or https, got '{}'", base_url.scheme());
        }

        if self.llm.provider.timeout_seconds == Some(0) {
            anyhow::bail!("llm.provider.timeout_seconds must be greater than 0");
        }

        Ok(())
    }

    fn validate_prompt_config(&self) -> anyhow::Result<()> {
        if self.llm.prompt.template_path.as_os_str().is_empty() {
            anyhow::bail!("llm.prompt.template_path must not be empty");
        }

        Ok(())
    }

    fn validate_auth_config(&self) -> anyhow::Result<()> {
        let Some(ref auth) = self.server.auth else {
            return Ok(());
        };

        if !auth.enabled {
            return Ok(());
        }

        if auth.api_key.expose_secret().is_empty() {
            anyhow::bail!("server.auth.api_key must not be empty when auth is enabled");
        }

        if http_header_name_is_invalid(&auth.header_name) {
            anyhow::bail!("server.auth.header_name '{}' is not a valid header name", auth.header_name);
        }

        Ok(())
    }

    fn validate_telemetry_config(&self) -> anyhow::Result<()> {
        let Some(rate) = self
            .telemetry
            .as_ref()
            .and_then(|t| t.tracing.as_ref())
            .map(|t| t.sampling_rate)
        else {
            return Ok(());
        };

        if !(0.0..=1.0).contains(&rate) {
            anyhow::bail!("telemetry.tracing.sampling_rate must be between 0.0 and 1.0, got {rate}");
        }

        Ok(())
    }
}

fn http_header_name_is_invalid(name: &str) -> bool {
    name.is_empty()
        || !name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_'))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use indoc::indoc;
    use secrecy::ExposeSecret;

    use crate::{Config, LogFormat, ToolResultRole};

    #[test]
    fn empty_file_is_a_valid_config() {
        let config = Config::parse("").unwrap();
        assert!(config.server.listen_address.is_none());
        assert!(config.server.health.enabled);
        assert!(config.server.auth.is_none());
        assert!(config.telemetry.is_none());
    }

    #[test]
    fn full_config_round_trips_through_expansion() {
        let raw = indoc! {r#"
            [server]
            listen_address = "127.0.0.1:8080"

            [server.auth]
            api_key = "{{ env.AXON_LOADER_SERVICE_KEY }}"

            [llm.provider]
            api_key = "{{ env.AXON_LOADER_UPSTREAM_KEY | default("none") }}"

            [llm.prompt]
            template_path = "instructionsV2.md"
            tool_result_role = "system"

            [telemetry]
            log_format = "json"
        "#};

        temp_env::with_vars(
            [
                ("AXON_LOADER_SERVICE_KEY", Some("svc-key")),
                ("AXON_LOADER_UPSTREAM_KEY", None),
            ],
            || {
                let config = Config::parse(raw).unwrap();
                let auth = config.server.auth.as_ref().unwrap();
                assert_eq!(auth.api_key.expose_secret(), "svc-key");
                assert_eq!(
                    config.llm.provider.api_key.as_ref().map(|k| k.expose_secret().to_owned()),
                    Some("none".to_owned())
                );
                assert_eq!(config.llm.prompt.tool_result_role, ToolResultRole::System);
                assert_eq!(config.telemetry.as_ref().map(|t| t.log_format), Some(LogFormat::Json));
            },
        );
    }

    #[test]
    fn non_http_base_url_is_rejected() {
        let err = Config::parse("[llm.provider]\nbase_url = \"ftp://example.com\"").unwrap_err();
        assert!(err.to_string().contains("http or https"));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let err = Config::parse("[llm.provider]\ntimeout_seconds = 0").unwrap_err();
        assert!(err.to_string().contains("timeout_seconds"));
    }

    #[test]
    fn empty_auth_key_is_rejected_when_enabled() {
        let err = Config::parse("[server.auth]\napi_key = \"\"").unwrap_err();
        assert!(err.to_string().contains("api_key"));
    }

    #[test]
    fn empty_auth_key_is_allowed_when_disabled() {
        let config = Config::parse("[server.auth]\nenabled = false\napi_key = \"\"").unwrap();
        assert!(!config.server.auth.unwrap().enabled);
    }

    #[test]
    fn invalid_auth_header_is_rejected() {
        let err = Config::parse("[server.auth]\napi_key = \"k\"\nheader_name = \"x api key\"").unwrap_err();
        assert!(err.to_string().contains("header_name"));
    }

    #[test]
    fn out_of_range_sampling_rate_is_rejected() {
        let err = Config::parse("[telemetry.tracing]\nsampling_rate = 1.5").unwrap_err();
        assert!(err.to_string().contains("sampling_rate"));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(Config::parse("[llm.routing]\nenabled = true").is_err());
    }

    #[test]
    fn load_reads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server.health]\npath = \"/healthz\"").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.server.health.path, "/healthz");
    }

    #[test]
    fn load_reports_missing_file() {
        let err = Config::load(std::path::Path::new("/nonexistent/axon.toml")).unwrap_err();
        assert!(err.to_string().contains("failed to read config file"));
    }
}
