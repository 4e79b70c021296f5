//! In-memory implementation of [`WorkflowRepository`].

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use flowhub_app::ports::WorkflowRepository;
use flowhub_domain::error::FlowHubError;
use flowhub_domain::id::WorkflowId;
use flowhub_domain::workflow::{WorkflowDefinition, WorkflowExecutionLog, WorkflowStatus};

#[derive(Debug, Default)]
struct Inner {
    definitions: HashMap<WorkflowId, WorkflowDefinition>,
    execution_logs: Vec<WorkflowExecutionLog>,
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryWorkflowRepository {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryWorkflowRepository {
    #[must_use]
    pub fn with(definitions: Vec<WorkflowDefinition>) -> Self {
        let repo = Self::default();
        for definition in definitions {
            repo.save(definition);
        }
        repo
    }

    pub fn save(&self, definition: WorkflowDefinition) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .definitions
            .insert(definition.id, definition);
    }

    #[must_use]
    pub fn execution_logs(&self) -> Vec<WorkflowExecutionLog> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .execution_logs
            .clone()
    }
}

impl WorkflowRepository for InMemoryWorkflowRepository {
    async fn get_by_id(&self, id: WorkflowId) -> Result<Option<WorkflowDefinition>, FlowHubError> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        Ok(inner.definitions.get(&id).cloned())
    }

    async fn get_active(&self) -> Result<Vec<WorkflowDefinition>, FlowHubError> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        Ok(inner
            .definitions
            .values()
            .filter(|d| d.status == WorkflowStatus::Active)
            .cloned()
            .collect())
    }

    async fn append_execution_log(&self, log: WorkflowExecutionLog) -> Result<(), FlowHubError> {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .execution_logs
            .push(log);
        Ok(())
    }
}
