//! Orchestrator configuration
//!
//! Configuration is read once at startup and passed to the orchestrator by
//! value. Sources, in increasing precedence: built-in defaults, an optional
//! TOML file, then `NCUSCRIPT_*` environment variables.

use crate::error::{ConfigError, NcuResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "https://openrouter.ai/api/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "openai/gpt-4o-mini";
pub const DEFAULT_REFERER: &str = "https://ncuscript.local";
pub const DEFAULT_TITLE: &str = "NcuScript Automator";

/// Attribution headers sent to providers that identify calling applications.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AttributionConfig {
    /// Sent as `HTTP-Referer`.
    pub referer: Option<String>,
    /// Sent as `X-Title`.
    pub title: Option<String>,
}

impl Default for AttributionConfig {
    fn default() -> Self {
        Self {
            referer: Some(DEFAULT_REFERER.to_string()),
            title: Some(DEFAULT_TITLE.to_string()),
        }
    }
}

/// Settings for the chat-completion endpoint and the orchestrator.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AutomatorConfig {
    pub endpoint: String,
    pub model: String,
    /// Required for every call, but absence is only reported when a call is made.
    pub api_key: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub request_timeout_ms: u64,
    /// How much of an unparsable model reply is quoted back in a fallback result.
    pub raw_excerpt_chars: usize,
    pub attribution: AttributionConfig,
}

impl Default for AutomatorConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            temperature: 0.3,
            max_tokens: 4000,
            request_timeout_ms: 120_000,
            raw_excerpt_chars: 1000,
            attribution: AttributionConfig::default(),
        }
    }
}

impl AutomatorConfig {
    /// Load configuration for a process.
    ///
    /// The file comes from `--config <path>` or `NCUSCRIPT_CONFIG`; without
    /// either, defaults are used. Environment overrides are applied last and
    /// the result is validated.
    pub fn load() -> NcuResult<Self> {
        let base = match config_path_from_args().or_else(config_path_from_env) {
            Some(path) => Self::from_path(&path)?,
            None => Self::default(),
        };
        let config = base.with_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Read a TOML config file. Missing keys take their defaults.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        toml::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }

    /// Defaults with environment overrides applied.
    ///
    /// Environment variables:
    /// - `NCUSCRIPT_API_ENDPOINT`, `NCUSCRIPT_MODEL`, `NCUSCRIPT_API_KEY`
    /// - `NCUSCRIPT_TEMPERATURE`, `NCUSCRIPT_MAX_TOKENS`
    /// - `NCUSCRIPT_REQUEST_TIMEOUT_MS`, `NCUSCRIPT_RAW_EXCERPT_CHARS`
    /// - `NCUSCRIPT_HTTP_REFERER`, `NCUSCRIPT_APP_TITLE`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_overrides()
    }

    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup. Blank values are ignored.
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(endpoint) = get("NCUSCRIPT_API_ENDPOINT") {
            self.endpoint = endpoint.trim().to_string();
        }
        if let Some(model) = get("NCUSCRIPT_MODEL") {
            self.model = model.trim().to_string();
        }
        if let Some(key) = get("NCUSCRIPT_API_KEY") {
            self.api_key = Some(key.trim().to_string());
        }
        if let Some(value) = get("NCUSCRIPT_TEMPERATURE") {
            self.temperature = parse_env("NCUSCRIPT_TEMPERATURE", &value)?;
        }
        if let Some(value) = get("NCUSCRIPT_MAX_TOKENS") {
            self.max_tokens = parse_env("NCUSCRIPT_MAX_TOKENS", &value)?;
        }
        if let Some(value) = get("NCUSCRIPT_REQUEST_TIMEOUT_MS") {
            self.request_timeout_ms = parse_env("NCUSCRIPT_REQUEST_TIMEOUT_MS", &value)?;
        }
        if let Some(value) = get("NCUSCRIPT_RAW_EXCERPT_CHARS") {
            self.raw_excerpt_chars = parse_env("NCUSCRIPT_RAW_EXCERPT_CHARS", &value)?;
        }
        if let Some(referer) = get("NCUSCRIPT_HTTP_REFERER") {
            self.attribution.referer = Some(referer.trim().to_string());
        }
        if let Some(title) = get("NCUSCRIPT_APP_TITLE") {
            self.attribution.title = Some(title.trim().to_string());
        }
        Ok(self)
    }

    /// Validate the configuration.
    ///
    /// A missing API key is deliberately not checked here; see
    /// [`AutomatorConfig::require_api_key`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        let endpoint = self.endpoint.trim();
        if endpoint.is_empty() {
            return Err(invalid("endpoint", &self.endpoint, "endpoint must not be empty"));
        }
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(invalid(
                "endpoint",
                &self.endpoint,
                "endpoint must be an http(s) URL",
            ));
        }

        if self.model.trim().is_empty() {
            return Err(invalid("model", &self.model, "model must not be empty"));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(invalid(
                "temperature",
                &self.temperature.to_string(),
                "temperature must be between 0.0 and 2.0",
            ));
        }

        if self.max_tokens == 0 {
            return Err(invalid("max_tokens", "0", "max_tokens must be greater than 0"));
        }

        if self.request_timeout_ms == 0 {
            return Err(invalid(
                "request_timeout_ms",
                "0",
                "request_timeout_ms must be greater than 0",
            ));
        }

        if self.raw_excerpt_chars == 0 {
            return Err(invalid(
                "raw_excerpt_chars",
                "0",
                "raw_excerpt_chars must be greater than 0",
            ));
        }

        Ok(())
    }

    /// The API key, or `ConfigError::MissingApiKey` if none is set.
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or(ConfigError::MissingApiKey)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl std::fmt::Debug for AutomatorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutomatorConfig")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("request_timeout_ms", &self.request_timeout_ms)
            .field("raw_excerpt_chars", &self.raw_excerpt_chars)
            .field("attribution", &self.attribution)
            .finish()
    }
}

fn invalid(field: &str, value: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| invalid(key, value, "could not be parsed"))
}

fn config_path_from_env() -> Option<PathBuf> {
    std::env::var("NCUSCRIPT_CONFIG").ok().map(PathBuf::from)
}

fn config_path_from_args() -> Option<PathBuf> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            return args.next().map(PathBuf::from);
        }
    }
    None
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config_is_valid_without_key() {
        let config = AutomatorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.require_api_key(), Err(ConfigError::MissingApiKey));
    }

    #[test]
    fn test_blank_api_key_is_missing() {
        let config = AutomatorConfig {
            api_key: Some("   ".to_string()),
            ..Default::default()
        };
        assert_eq!(config.require_api_key(), Err(ConfigError::MissingApiKey));
    }

    #[test]
    fn test_overrides_apply() {
        let config = AutomatorConfig::default()
            .with_overrides_from(lookup(&[
                ("NCUSCRIPT_API_ENDPOINT", "http://localhost:8080/v1/chat/completions"),
                ("NCUSCRIPT_MODEL", "local/model"),
                ("NCUSCRIPT_API_KEY", " sk-test "),
                ("NCUSCRIPT_TEMPERATURE", "0.7"),
                ("NCUSCRIPT_MAX_TOKENS", "512"),
                ("NCUSCRIPT_APP_TITLE", "Console"),
            ]))
            .unwrap();

        assert_eq!(config.endpoint, "http://localhost:8080/v1/chat/completions");
        assert_eq!(config.model, "local/model");
        assert_eq!(config.require_api_key(), Ok("sk-test"));
        assert_eq!(config.temperature, 0.7);
        assert_eq!(config.max_tokens, 512);
        assert_eq!(config.attribution.title.as_deref(), Some("Console"));
        assert_eq!(config.attribution.referer.as_deref(), Some(DEFAULT_REFERER));
    }

    #[test]
    fn test_blank_override_is_ignored() {
        let config = AutomatorConfig::default()
            .with_overrides_from(lookup(&[("NCUSCRIPT_MODEL", "  ")]))
            .unwrap();
        assert_eq!(config.model, DEFAULT_MODEL);
    }

    #[test]
    fn test_unparsable_override_is_rejected() {
        let err = AutomatorConfig::default()
            .with_overrides_from(lookup(&[("NCUSCRIPT_MAX_TOKENS", "lots")]))
            .unwrap_err();
        match err {
            ConfigError::InvalidValue { field, value, .. } => {
                assert_eq!(field, "NCUSCRIPT_MAX_TOKENS");
                assert_eq!(value, "lots");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let bad = [
            AutomatorConfig {
                endpoint: " ".to_string(),
                ..Default::default()
            },
            AutomatorConfig {
                endpoint: "ftp://example.com".to_string(),
                ..Default::default()
            },
            AutomatorConfig {
                model: String::new(),
                ..Default::default()
            },
            AutomatorConfig {
                temperature: 2.5,
                ..Default::default()
            },
            AutomatorConfig {
                max_tokens: 0,
                ..Default::default()
            },
            AutomatorConfig {
                request_timeout_ms: 0,
                ..Default::default()
            },
            AutomatorConfig {
                raw_excerpt_chars: 0,
                ..Default::default()
            },
        ];
        for config in bad {
            assert!(config.validate().is_err(), "accepted {:?}", config);
        }
    }

    #[test]
    fn test_from_path_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "model = \"anthropic/claude-3-haiku\"\napi_key = \"sk-file\"\n\n[attribution]\ntitle = \"Audit\""
        )
        .unwrap();

        let config = AutomatorConfig::from_path(file.path()).unwrap();
        assert_eq!(config.model, "anthropic/claude-3-haiku");
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.attribution.title.as_deref(), Some("Audit"));
        assert_eq!(config.attribution.referer.as_deref(), Some(DEFAULT_REFERER));
        assert_eq!(config.require_api_key(), Ok("sk-file"));
    }

    #[test]
    fn test_from_path_rejects_unknown_keys() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "modle = \"typo\"").unwrap();
        let err = AutomatorConfig::from_path(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_from_path_missing_file() {
        let err = AutomatorConfig::from_path(Path::new("/nonexistent/ncuscript.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let config = AutomatorConfig {
            api_key: Some("sk-secret-value".to_string()),
            ..Default::default()
        };
        let debug = format!("{:?}", config);
        assert!(!debug.contains("sk-secret-value"));
        assert!(debug.contains("[REDACTED]"));
    }
}
