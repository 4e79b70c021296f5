//! HTTP adapter error types.

use flowhub_domain::error::FlowHubError;

/// Errors specific to the reqwest adapter.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    /// The underlying client could not be built.
    #[error("failed to build HTTP client")]
    Build(#[source] reqwest::Error),

    /// The request could not be sent or its body not read.
    #[error("request to {url} failed")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The agent collaborator answered with a non-success status.
    #[error("agent responded with status {status}")]
    AgentStatus { status: u16 },

    /// The agent collaborator answered with something other than JSON.
    #[error("agent response is not valid JSON")]
    AgentPayload(#[source] reqwest::Error),
}

impl From<HttpError> for FlowHubError {
    fn from(err: HttpError) -> Self {
        Self::Gateway(Box::new(err))
    }
}
