//! Automation repository port — persistence for automation definitions and run logs.

use std::future::Future;

use flowhub_domain::automation::AutomationDefinition;
use flowhub_domain::error::FlowHubError;
use flowhub_domain::execution::ExecutionResult;
use flowhub_domain::id::AutomationId;
use flowhub_domain::time::Timestamp;

/// Store of [`AutomationDefinition`]s as seen by the engine.
///
/// Definitions are created and edited elsewhere; the engine only reads
/// them, stamps runs and appends execution logs.
pub trait AutomationRepository {
    /// Get all definitions with `is_active = true`.
    fn get_active(
        &self,
    ) -> impl Future<Output = Result<Vec<AutomationDefinition>, FlowHubError>> + Send;

    /// Get a definition by its unique identifier, active or not.
    fn get_by_id(
        &self,
        id: AutomationId,
    ) -> impl Future<Output = Result<Option<AutomationDefinition>, FlowHubError>> + Send;

    /// Stamp `last_run` and increment `run_count`.
    fn record_run(
        &self,
        id: AutomationId,
        at: Timestamp,
    ) -> impl Future<Output = Result<(), FlowHubError>> + Send;

    /// Append the record of a finished run.
    fn append_run_log(
        &self,
        result: ExecutionResult,
    ) -> impl Future<Output = Result<(), FlowHubError>> + Send;
}

impl<T: AutomationRepository + Send + Sync> AutomationRepository for std::sync::Arc<T> {
    fn get_active(
        &self,
    ) -> impl Future<Output = Result<Vec<AutomationDefinition>, FlowHubError>> + Send {
        (**self).get_active()
    }

    fn get_by_id(
        &self,
        id: AutomationId,
    ) -> impl Future<Output = Result<Option<AutomationDefinition>, FlowHubError>> + Send {
        (**self).get_by_id(id)
    }

    fn record_run(
        &self,
        id: AutomationId,
        at: Timestamp,
    ) -> impl Future<Output = Result<(), FlowHubError>> + Send {
        (**self).record_run(id, at)
    }

    fn append_run_log(
        &self,
        result: ExecutionResult,
    ) -> impl Future<Output = Result<(), FlowHubError>> + Send {
        (**self).append_run_log(result)
    }
}
