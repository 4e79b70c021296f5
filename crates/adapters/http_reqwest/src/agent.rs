//! [`AgentRunner`] implementation against the agent service's `/chat` endpoint.

use std::time::Duration;

use flowhub_app::ports::{AgentRequest, AgentRunner};
use flowhub_domain::error::FlowHubError;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;

use crate::config::AgentConfig;
use crate::error::HttpError;

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    messages: Vec<ChatMessage<'a>>,
    model: &'a str,
    temperature: f32,
    max_tokens: u32,
    user_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    agent_id: Option<&'a str>,
    /// Run metadata and variables.
    #[serde(skip_serializing_if = "Value::is_null")]
    context: &'a Value,
}

/// Sends each prompt as a single user message and returns the JSON reply
/// (`{content, model, usage}`) untouched.
#[derive(Debug, Clone)]
pub struct ReqwestAgent {
    client: Client,
    endpoint: String,
    config: AgentConfig,
}

impl ReqwestAgent {
    #[must_use]
    pub fn new(client: Client, config: AgentConfig) -> Self {
        let endpoint = format!("{}/chat", config.base_url.trim_end_matches('/'));
        Self {
            client,
            endpoint,
            config,
        }
    }

    /// Build with a dedicated client.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::Build`] if the TLS backend cannot be initialised.
    pub fn from_config(config: AgentConfig) -> Result<Self, HttpError> {
        let client = Client::builder().build().map_err(HttpError::Build)?;
        Ok(Self::new(client, config))
    }
}

impl AgentRunner for ReqwestAgent {
    async fn run(&self, request: AgentRequest) -> Result<Value, FlowHubError> {
        let payload = ChatRequest {
            messages: vec![ChatMessage {
                role: "user",
                content: &request.input,
            }],
            model: &self.config.model,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            user_id: &request.user_id,
            agent_id: request.agent_id.as_deref(),
            context: &request.context,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .json(&payload)
            .send()
            .await
            .map_err(|source| HttpError::Transport {
                url: self.endpoint.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(
                endpoint = %self.endpoint,
                status = status.as_u16(),
                "agent request rejected"
            );
            return Err(HttpError::AgentStatus {
                status: status.as_u16(),
            }
            .into());
        }
        let reply = response
            .json::<Value>()
            .await
            .map_err(HttpError::AgentPayload)?;
        Ok(reply)
    }
}
