//! Seed document loading and store construction.

use std::path::PathBuf;

use flowhub_domain::automation::AutomationDefinition;
use flowhub_domain::workflow::WorkflowDefinition;
use serde::{Deserialize, Serialize};

use crate::automation_repo::InMemoryAutomationRepository;
use crate::error::StorageError;
use crate::workflow_repo::InMemoryWorkflowRepository;

/// Definitions a store starts with.
///
/// ```json
/// { "automations": [ ... ], "workflows": [ ... ] }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Seed {
    #[serde(default)]
    pub automations: Vec<AutomationDefinition>,
    #[serde(default)]
    pub workflows: Vec<WorkflowDefinition>,
}

impl Seed {
    /// Parse a seed document.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Json`] if the document is malformed.
    pub fn from_json(raw: &str) -> Result<Self, StorageError> {
        Ok(serde_json::from_str(raw)?)
    }
}

/// Configuration for the in-memory storage adapter.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// JSON seed file; the store starts empty when absent.
    pub seed_path: Option<PathBuf>,
}

impl Config {
    /// Build a [`Store`], loading the seed file if one is configured.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the seed file cannot be read or parsed.
    pub fn build(self) -> Result<Store, StorageError> {
        let seed = match self.seed_path {
            Some(path) => {
                let raw = std::fs::read_to_string(&path).map_err(|source| StorageError::Io {
                    path: path.display().to_string(),
                    source,
                })?;
                Seed::from_json(&raw)?
            }
            None => Seed::default(),
        };
        tracing::info!(
            automations = seed.automations.len(),
            workflows = seed.workflows.len(),
            "storage seeded"
        );
        Ok(Store::from_seed(seed))
    }
}

/// Holds both repositories over one seed.
#[derive(Debug, Clone, Default)]
pub struct Store {
    automations: InMemoryAutomationRepository,
    workflows: InMemoryWorkflowRepository,
}

impl Store {
    #[must_use]
    pub fn from_seed(seed: Seed) -> Self {
        Self {
            automations: InMemoryAutomationRepository::with(seed.automations),
            workflows: InMemoryWorkflowRepository::with(seed.workflows),
        }
    }

    /// Handle to the automation repository; clones share state.
    #[must_use]
    pub fn automations(&self) -> InMemoryAutomationRepository {
        self.automations.clone()
    }

    #[must_use]
    pub fn workflows(&self) -> InMemoryWorkflowRepository {
        self.workflows.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowhub_app::ports::{AutomationRepository, WorkflowRepository};

    const SEED: &str = r#"{
        "automations": [{
            "id": "8d0f6a52-3c1e-4b8e-9a4f-2f1b0c9d7e61",
            "name": "Morning report",
            "trigger": {"type": "CRON", "cron_expression": "0 8 * * *"},
            "actions": [{"type": "SEND_NOTIFICATION", "title": "Hi", "message": "Good morning"}]
        }],
        "workflows": [{
            "id": "0b7c2d7e-6f0a-4d55-8a3c-5d1e9f2a4b10",
            "name": "Triage",
            "status": "ACTIVE",
            "nodes": [
                {"id": "start", "type": "trigger", "next": ["end"]},
                {"id": "end", "type": "end"}
            ]
        }]
    }"#;

    #[tokio::test]
    async fn should_load_definitions_from_seed_document() {
        let store = Store::from_seed(Seed::from_json(SEED).unwrap());
        let automations = store.automations().get_active().await.unwrap();
        assert_eq!(automations.len(), 1);
        assert_eq!(automations[0].name, "Morning report");
        assert!(automations[0].is_active);
        assert_eq!(store.workflows().get_active().await.unwrap().len(), 1);
    }

    #[test]
    fn should_accept_empty_document() {
        let seed = Seed::from_json("{}").unwrap();
        assert!(seed.automations.is_empty());
        assert!(seed.workflows.is_empty());
    }

    #[test]
    fn should_reject_malformed_document() {
        assert!(matches!(
            Seed::from_json(r#"{"automations": [{"name": 3}]}"#),
            Err(StorageError::Json(_))
        ));
    }

    #[test]
    fn should_report_missing_seed_file() {
        let result = Config {
            seed_path: Some(PathBuf::from("/nonexistent/flowhub-seed.json")),
        }
        .build();
        assert!(matches!(result, Err(StorageError::Io { .. })));
    }

    #[test]
    fn should_start_empty_without_seed_path() {
        assert!(Config::default().build().is_ok());
    }
}
