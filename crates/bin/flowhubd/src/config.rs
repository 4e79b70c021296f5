//! Configuration loading — TOML file with environment variable overrides.
//!
//! Looks for `flowhub.toml` in the working directory. Every field has a
//! sensible default so the file is optional. Environment variables take
//! precedence over file values.

use std::path::PathBuf;
use std::time::Duration;

use flowhub_adapter_http_reqwest::{AgentConfig, HttpConfig};
use serde::Deserialize;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Rule engine settings.
    pub engine: EngineConfig,
    /// Outbound HTTP settings for `API_CALL` / `WEBHOOK`.
    pub http: HttpConfig,
    /// Agent collaborator settings.
    pub agent: AgentConfig,
    /// Workflow runtime settings.
    pub workflows: WorkflowsConfig,
    /// Definition storage settings.
    pub storage: StorageConfig,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Capacity of the in-process event bus.
    pub event_bus_capacity: usize,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct WorkflowsConfig {
    /// How long finished executions stay pollable, in seconds.
    pub retention_secs: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// JSON seed document with the initial definitions.
    pub seed_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from `flowhub.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// resulting configuration is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("flowhub.toml")?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("FLOWHUB_AGENT_URL") {
            self.agent.base_url = val;
        }
        if let Ok(val) = std::env::var("FLOWHUB_SEED_PATH") {
            self.storage.seed_path = Some(PathBuf::from(val));
        }
        if let Ok(val) = std::env::var("FLOWHUB_HTTP_TIMEOUT_SECS")
            && let Ok(secs) = val.parse()
        {
            self.http.timeout_secs = secs;
        }
        if let Ok(val) = std::env::var("FLOWHUB_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.event_bus_capacity == 0 {
            return Err(ConfigError::Validation(
                "event_bus_capacity must be non-zero".to_string(),
            ));
        }
        if self.http.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "http timeout_secs must be non-zero".to_string(),
            ));
        }
        if self.agent.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "agent timeout_secs must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http.timeout_secs)
    }

    #[must_use]
    pub fn workflow_retention(&self) -> Duration {
        Duration::from_secs(self.workflows.retention_secs)
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "flowhubd=info,flowhub_app=info".to_string(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            event_bus_capacity: 256,
        }
    }
}

impl Default for WorkflowsConfig {
    fn default() -> Self {
        Self {
            retention_secs: 3600,
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_produce_sensible_defaults() {
        let config = Config::default();
        assert_eq!(config.engine.event_bus_capacity, 256);
        assert_eq!(config.http.timeout_secs, 30);
        assert_eq!(config.workflows.retention_secs, 3600);
        assert!(config.storage.seed_path.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn should_parse_minimal_toml() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.engine.event_bus_capacity, 256);
    }

    #[test]
    fn should_parse_full_toml() {
        let toml = "
            [logging]
            filter = 'debug'

            [engine]
            event_bus_capacity = 1024

            [http]
            timeout_secs = 10
            user_agent = 'flowhub-test'

            [agent]
            base_url = 'http://ai:8000'
            model = 'gpt-4o'

            [workflows]
            retention_secs = 60

            [storage]
            seed_path = '/etc/flowhub/seed.json'
        ";
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.logging.filter, "debug");
        assert_eq!(config.engine.event_bus_capacity, 1024);
        assert_eq!(config.http_timeout(), Duration::from_secs(10));
        assert_eq!(config.http.user_agent, "flowhub-test");
        assert_eq!(config.agent.base_url, "http://ai:8000");
        assert_eq!(config.agent.model, "gpt-4o");
        assert_eq!(config.workflow_retention(), Duration::from_secs(60));
        assert_eq!(
            config.storage.seed_path,
            Some(PathBuf::from("/etc/flowhub/seed.json"))
        );
    }

    #[test]
    fn should_return_default_when_file_not_found() {
        let config = Config::from_file("nonexistent.toml").unwrap();
        assert_eq!(config.engine.event_bus_capacity, 256);
    }

    #[test]
    fn should_reject_zero_capacity() {
        let mut config = Config::default();
        config.engine.event_bus_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn should_reject_zero_timeout() {
        let mut config = Config::default();
        config.http.timeout_secs = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn should_report_parse_error_for_invalid_toml() {
        let result: Result<Config, _> = toml::from_str("invalid {{{");
        assert!(result.is_err());
    }
}
