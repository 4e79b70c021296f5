//! Agent port — hands a prompt to the AI agent collaborator.

use std::future::Future;

use flowhub_domain::error::FlowHubError;
use serde_json::Value;

/// One `AGENT_EXECUTE` invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentRequest {
    /// Prompt text, already interpolated.
    pub input: String,
    pub agent_id: Option<String>,
    pub user_id: String,
    /// Run metadata and scope, forwarded for the agent's own use.
    pub context: Value,
}

pub trait AgentRunner {
    /// Run the agent and return its structured result.
    fn run(&self, request: AgentRequest)
    -> impl Future<Output = Result<Value, FlowHubError>> + Send;
}

impl<T: AgentRunner + Send + Sync> AgentRunner for std::sync::Arc<T> {
    fn run(
        &self,
        request: AgentRequest,
    ) -> impl Future<Output = Result<Value, FlowHubError>> + Send {
        (**self).run(request)
    }
}
