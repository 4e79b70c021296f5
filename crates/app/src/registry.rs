//! In-memory cache of active automation definitions.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use flowhub_domain::automation::{AutomationDefinition, TriggerConfig, TriggerEvent};
use flowhub_domain::id::AutomationId;
use flowhub_domain::time::Timestamp;

/// Cached definitions keyed by id, refreshed wholesale or one at a time.
#[derive(Debug, Default)]
pub struct DefinitionRegistry {
    definitions: RwLock<HashMap<AutomationId, AutomationDefinition>>,
}

impl DefinitionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<AutomationId, AutomationDefinition>> {
        self.definitions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<AutomationId, AutomationDefinition>> {
        self.definitions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the whole cache. Inactive definitions are skipped.
    pub fn replace_all(&self, definitions: Vec<AutomationDefinition>) {
        let fresh: HashMap<_, _> = definitions
            .into_iter()
            .filter(|d| d.is_active)
            .map(|d| (d.id, d))
            .collect();
        *self.write() = fresh;
    }

    /// Insert or refresh one definition; an inactive one is evicted instead.
    pub fn upsert(&self, definition: AutomationDefinition) {
        let mut definitions = self.write();
        if definition.is_active {
            definitions.insert(definition.id, definition);
        } else {
            definitions.remove(&definition.id);
        }
    }

    pub fn remove(&self, id: AutomationId) -> Option<AutomationDefinition> {
        self.write().remove(&id)
    }

    #[must_use]
    pub fn get(&self, id: AutomationId) -> Option<AutomationDefinition> {
        self.read().get(&id).cloned()
    }

    #[must_use]
    pub fn all(&self) -> Vec<AutomationDefinition> {
        self.read().values().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Definitions whose trigger matches `event`.
    #[must_use]
    pub fn matching(&self, event: &TriggerEvent) -> Vec<AutomationDefinition> {
        self.read()
            .values()
            .filter(|d| d.trigger.matches(d.id, event))
            .cloned()
            .collect()
    }

    /// Whether any cached `EVENT` trigger listens for `event_name`.
    #[must_use]
    pub fn is_interested(&self, event_name: &str) -> bool {
        self.read().values().any(|d| {
            matches!(&d.trigger, TriggerConfig::Event { event_name: name } if name == event_name)
        })
    }

    /// Mirror a persisted run into the cached copy.
    pub fn record_run(&self, id: AutomationId, at: Timestamp) {
        if let Some(definition) = self.write().get_mut(&id) {
            definition.run_count = definition.run_count.saturating_add(1);
            definition.last_run = Some(at);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowhub_domain::automation::ActionKind;
    use flowhub_domain::time::now;
    use serde_json::json;

    fn definition(name: &str, trigger: TriggerConfig) -> AutomationDefinition {
        AutomationDefinition::builder()
            .name(name)
            .trigger(trigger)
            .action(ActionKind::Delay { delay_ms: 1 })
            .build()
            .unwrap()
    }

    fn on_event(name: &str) -> TriggerConfig {
        TriggerConfig::Event {
            event_name: name.to_string(),
        }
    }

    #[test]
    fn should_skip_inactive_definitions_on_replace() {
        let registry = DefinitionRegistry::new();
        let active = definition("A", on_event("a"));
        let mut inactive = definition("B", on_event("b"));
        inactive.is_active = false;
        registry.replace_all(vec![active.clone(), inactive]);
        assert_eq!(registry.len(), 1);
        assert!(registry.get(active.id).is_some());
    }

    #[test]
    fn should_evict_on_upsert_of_inactive_definition() {
        let registry = DefinitionRegistry::new();
        let mut def = definition("A", on_event("a"));
        registry.upsert(def.clone());
        def.is_active = false;
        registry.upsert(def.clone());
        assert!(registry.get(def.id).is_none());
    }

    #[test]
    fn should_match_by_event_name_only() {
        let registry = DefinitionRegistry::new();
        let door = definition("Door", on_event("door.opened"));
        registry.replace_all(vec![door.clone(), definition("Window", on_event("window.opened"))]);
        let matched = registry.matching(&TriggerEvent::named("door.opened", json!({})));
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].id, door.id);
        assert!(registry.is_interested("window.opened"));
        assert!(!registry.is_interested("garage.opened"));
    }

    #[test]
    fn should_never_match_manual_implicitly() {
        let registry = DefinitionRegistry::new();
        let manual = definition("Button", TriggerConfig::Manual);
        registry.upsert(manual.clone());
        assert!(
            registry
                .matching(&TriggerEvent::manual(manual.id, json!({})))
                .is_empty()
        );
    }

    #[test]
    fn should_mirror_recorded_runs() {
        let registry = DefinitionRegistry::new();
        let def = definition("A", on_event("a"));
        registry.upsert(def.clone());
        let at = now();
        registry.record_run(def.id, at);
        let cached = registry.get(def.id).unwrap();
        assert_eq!(cached.run_count, 1);
        assert_eq!(cached.last_run, Some(at));
    }
}
