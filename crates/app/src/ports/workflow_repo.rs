//! Workflow repository port — persistence for workflow graphs and execution logs.

use std::future::Future;

use flowhub_domain::error::FlowHubError;
use flowhub_domain::id::WorkflowId;
use flowhub_domain::workflow::{WorkflowDefinition, WorkflowExecutionLog};

pub trait WorkflowRepository {
    fn get_by_id(
        &self,
        id: WorkflowId,
    ) -> impl Future<Output = Result<Option<WorkflowDefinition>, FlowHubError>> + Send;

    /// Get all workflows with status `ACTIVE`.
    fn get_active(
        &self,
    ) -> impl Future<Output = Result<Vec<WorkflowDefinition>, FlowHubError>> + Send;

    /// Append the durable record of a terminal workflow execution.
    fn append_execution_log(
        &self,
        log: WorkflowExecutionLog,
    ) -> impl Future<Output = Result<(), FlowHubError>> + Send;
}

impl<T: WorkflowRepository + Send + Sync> WorkflowRepository for std::sync::Arc<T> {
    fn get_by_id(
        &self,
        id: WorkflowId,
    ) -> impl Future<Output = Result<Option<WorkflowDefinition>, FlowHubError>> + Send {
        (**self).get_by_id(id)
    }

    fn get_active(
        &self,
    ) -> impl Future<Output = Result<Vec<WorkflowDefinition>, FlowHubError>> + Send {
        (**self).get_active()
    }

    fn append_execution_log(
        &self,
        log: WorkflowExecutionLog,
    ) -> impl Future<Output = Result<(), FlowHubError>> + Send {
        (**self).append_execution_log(log)
    }
}
