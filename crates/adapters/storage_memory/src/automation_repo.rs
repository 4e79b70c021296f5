//! In-memory implementation of [`AutomationRepository`].

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use flowhub_app::ports::AutomationRepository;
use flowhub_domain::automation::AutomationDefinition;
use flowhub_domain::error::{FlowHubError, NotFoundError};
use flowhub_domain::execution::ExecutionResult;
use flowhub_domain::id::AutomationId;
use flowhub_domain::time::Timestamp;

#[derive(Debug, Default)]
struct Inner {
    definitions: HashMap<AutomationId, AutomationDefinition>,
    run_logs: Vec<ExecutionResult>,
}

/// Automation repository backed by a shared map. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAutomationRepository {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryAutomationRepository {
    #[must_use]
    pub fn with(definitions: Vec<AutomationDefinition>) -> Self {
        let repo = Self::default();
        for definition in definitions {
            repo.save(definition);
        }
        repo
    }

    /// Insert or replace a definition.
    pub fn save(&self, definition: AutomationDefinition) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .definitions
            .insert(definition.id, definition);
    }

    pub fn delete(&self, id: AutomationId) -> Option<AutomationDefinition> {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .definitions
            .remove(&id)
    }

    /// Run logs appended so far, oldest first.
    #[must_use]
    pub fn run_logs(&self) -> Vec<ExecutionResult> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .run_logs
            .clone()
    }
}

impl AutomationRepository for InMemoryAutomationRepository {
    async fn get_active(&self) -> Result<Vec<AutomationDefinition>, FlowHubError> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let mut active: Vec<_> = inner
            .definitions
            .values()
            .filter(|d| d.is_active)
            .cloned()
            .collect();
        active.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(active)
    }

    async fn get_by_id(
        &self,
        id: AutomationId,
    ) -> Result<Option<AutomationDefinition>, FlowHubError> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        Ok(inner.definitions.get(&id).cloned())
    }

    async fn record_run(&self, id: AutomationId, at: Timestamp) -> Result<(), FlowHubError> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let definition = inner.definitions.get_mut(&id).ok_or_else(|| NotFoundError {
            entity: "Automation",
            id: id.to_string(),
        })?;
        definition.run_count = definition.run_count.saturating_add(1);
        definition.last_run = Some(at);
        Ok(())
    }

    async fn append_run_log(&self, result: ExecutionResult) -> Result<(), FlowHubError> {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .run_logs
            .push(result);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowhub_domain::automation::{ActionKind, TriggerConfig};
    use flowhub_domain::execution::ExecutionStatus;
    use flowhub_domain::time::now;

    fn valid_automation(name: &str) -> AutomationDefinition {
        AutomationDefinition::builder()
            .name(name)
            .trigger(TriggerConfig::Manual)
            .action(ActionKind::Delay { delay_ms: 10 })
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn should_return_none_when_automation_not_found() {
        let repo = InMemoryAutomationRepository::default();
        assert!(repo.get_by_id(AutomationId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn should_list_only_active_automations_by_name() {
        let mut disabled = valid_automation("Disabled");
        disabled.is_active = false;
        let repo = InMemoryAutomationRepository::with(vec![
            valid_automation("Zeta"),
            disabled,
            valid_automation("Alpha"),
        ]);

        let active = repo.get_active().await.unwrap();
        let names: Vec<_> = active.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["Alpha", "Zeta"]);
    }

    #[tokio::test]
    async fn should_increment_run_count_when_recording_run() {
        let auto = valid_automation("Counter");
        let id = auto.id;
        let repo = InMemoryAutomationRepository::with(vec![auto]);

        let at = now();
        repo.record_run(id, at).await.unwrap();
        repo.record_run(id, at).await.unwrap();

        let stored = repo.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(stored.run_count, 2);
        assert_eq!(stored.last_run, Some(at));
    }

    #[tokio::test]
    async fn should_fail_recording_run_of_unknown_automation() {
        let repo = InMemoryAutomationRepository::default();
        assert!(matches!(
            repo.record_run(AutomationId::new(), now()).await,
            Err(FlowHubError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn should_share_state_between_clones() {
        let repo = InMemoryAutomationRepository::default();
        let handle = repo.clone();
        let auto = valid_automation("Shared");
        let id = auto.id;
        handle.save(auto);

        let mut result = ExecutionResult::start(id, "manual");
        result.finish(ExecutionStatus::Completed, None);
        handle.append_run_log(result).await.unwrap();

        assert!(repo.get_by_id(id).await.unwrap().is_some());
        assert_eq!(repo.run_logs().len(), 1);
        assert!(repo.delete(id).is_some());
    }
}
