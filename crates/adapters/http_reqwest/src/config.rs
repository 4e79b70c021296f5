//! Outbound HTTP and agent configuration.

use serde::Deserialize;

/// Settings for the shared outbound HTTP client.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Upper bound for one `API_CALL` / `WEBHOOK` request, in seconds.
    pub timeout_secs: u64,
    /// `User-Agent` header sent with every request.
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: concat!("flowhub/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Where and how to reach the agent collaborator.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Base URL of the agent service; `/chat` is appended.
    pub base_url: String,
    /// Model name forwarded with every request.
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Upper bound for one agent call, in seconds.
    pub timeout_secs: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            model: "gpt-4".to_string(),
            temperature: 0.7,
            max_tokens: 1000,
            timeout_secs: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_have_sensible_defaults() {
        let http = HttpConfig::default();
        assert_eq!(http.timeout_secs, 30);
        assert!(http.user_agent.starts_with("flowhub/"));

        let agent = AgentConfig::default();
        assert_eq!(agent.base_url, "http://localhost:8000");
        assert_eq!(agent.model, "gpt-4");
        assert_eq!(agent.max_tokens, 1000);
    }

    #[test]
    fn should_use_defaults_for_missing_fields() {
        let config: AgentConfig = toml::from_str(r#"base_url = "http://ai:9000""#).unwrap();
        assert_eq!(config.base_url, "http://ai:9000");
        assert_eq!(config.model, "gpt-4");
    }
}
