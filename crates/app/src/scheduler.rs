//! Scheduler — one timer task per `CRON` / `TIME` automation.
//!
//! Each armed automation has exactly one map entry holding its
//! [`ScheduleSpec`] and the task driving it, so a recurring and a one-shot
//! timer can never both be live for one id. Timers do not run automations
//! themselves: a fire sends a targeted [`TriggerEvent`] to the engine.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use flowhub_domain::automation::{AutomationDefinition, TriggerEvent};
use flowhub_domain::error::FlowHubError;
use flowhub_domain::id::AutomationId;
use flowhub_domain::schedule::{
    CronValidation, ScheduleSpec, ScheduledAutomation, validate_cron_expression,
};
use flowhub_domain::time::{Timestamp, now};
use serde_json::json;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

struct Entry {
    info: ScheduledAutomation,
    generation: u64,
    task: JoinHandle<()>,
}

type Entries = Arc<Mutex<HashMap<AutomationId, Entry>>>;

fn lock(entries: &Entries) -> MutexGuard<'_, HashMap<AutomationId, Entry>> {
    entries.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct Scheduler {
    entries: Entries,
    generation: AtomicU64,
    triggers: mpsc::UnboundedSender<TriggerEvent>,
}

impl Scheduler {
    /// Fires are delivered on `triggers`.
    #[must_use]
    pub fn new(triggers: mpsc::UnboundedSender<TriggerEvent>) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            generation: AtomicU64::new(0),
            triggers,
        }
    }

    /// Arm the timer for `definition`, replacing any existing one.
    ///
    /// Returns `Ok(None)` when nothing was armed: not a time trigger,
    /// inactive, or a one-shot instant already in the past.
    ///
    /// # Errors
    ///
    /// Returns [`FlowHubError::Schedule`] when the cron expression or
    /// timezone does not parse; the definition is left unscheduled.
    #[tracing::instrument(skip(self, definition), fields(automation_id = %definition.id))]
    pub fn add(
        &self,
        definition: &AutomationDefinition,
    ) -> Result<Option<ScheduledAutomation>, FlowHubError> {
        self.remove(definition.id);
        if !definition.is_active {
            return Ok(None);
        }
        let spec = match ScheduleSpec::from_trigger(&definition.trigger) {
            Ok(Some(spec)) => spec,
            Ok(None) => return Ok(None),
            Err(err) => {
                tracing::warn!(%err, "invalid schedule, automation left unscheduled");
                return Err(err.into());
            }
        };

        let at = now();
        if let ScheduleSpec::OneShot(execute_at) = &spec
            && *execute_at <= at
        {
            tracing::debug!(%execute_at, "one-shot instant already past, not scheduling");
            return Ok(None);
        }

        let info = ScheduledAutomation::new(definition, &spec, at);
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        // Held across the spawn so the timer never observes a missing entry.
        let mut entries = lock(&self.entries);
        let task = tokio::spawn(run_timer(
            definition.id,
            spec,
            generation,
            Arc::clone(&self.entries),
            self.triggers.clone(),
        ));
        entries.insert(
            definition.id,
            Entry {
                info: info.clone(),
                generation,
                task,
            },
        );
        drop(entries);
        tracing::info!(
            next_run = ?info.next_run,
            trigger = %info.trigger_type,
            "automation scheduled"
        );
        Ok(Some(info))
    }

    /// Remove then re-add.
    ///
    /// # Errors
    ///
    /// See [`Scheduler::add`].
    pub fn update(
        &self,
        definition: &AutomationDefinition,
    ) -> Result<Option<ScheduledAutomation>, FlowHubError> {
        self.remove(definition.id);
        self.add(definition)
    }

    /// Disarm `id`. Returns whether a timer was armed.
    pub fn remove(&self, id: AutomationId) -> bool {
        match lock(&self.entries).remove(&id) {
            Some(entry) => {
                entry.task.abort();
                tracing::debug!(automation_id = %id, "automation unscheduled");
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn get(&self, id: AutomationId) -> Option<ScheduledAutomation> {
        lock(&self.entries).get(&id).map(|e| e.info.clone())
    }

    #[must_use]
    pub fn list(&self) -> Vec<ScheduledAutomation> {
        lock(&self.entries).values().map(|e| e.info.clone()).collect()
    }

    /// The `limit` soonest armed entries, by `next_run` ascending.
    #[must_use]
    pub fn get_next_executions(&self, limit: usize) -> Vec<ScheduledAutomation> {
        let mut upcoming: Vec<_> = self
            .list()
            .into_iter()
            .filter(|info| info.next_run.is_some())
            .collect();
        upcoming.sort_by_key(|info| info.next_run);
        upcoming.truncate(limit);
        upcoming
    }

    /// Preview a cron expression without scheduling anything.
    #[must_use]
    pub fn validate_cron_expression(expression: &str, timezone: Option<&str>) -> CronValidation {
        validate_cron_expression(expression, timezone, now())
    }

    /// Replace every timer with those of `definitions`. Returns the number
    /// armed; definitions that fail to schedule are skipped.
    pub fn sync(&self, definitions: &[AutomationDefinition]) -> usize {
        self.shutdown();
        let mut armed = 0;
        for definition in definitions {
            if let Ok(Some(_)) = self.add(definition) {
                armed += 1;
            }
        }
        armed
    }

    /// Abort every timer.
    pub fn shutdown(&self) {
        let drained: Vec<_> = lock(&self.entries).drain().collect();
        for (_, entry) in drained {
            entry.task.abort();
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn until(at: Timestamp) -> Duration {
    (at - now()).to_std().unwrap_or(Duration::ZERO)
}

async fn run_timer(
    id: AutomationId,
    spec: ScheduleSpec,
    generation: u64,
    entries: Entries,
    triggers: mpsc::UnboundedSender<TriggerEvent>,
) {
    let trigger_type = spec.trigger_type();
    let mut cursor = now();
    loop {
        let Some(fire_at) = spec.next_after(cursor) else {
            tracing::debug!(automation_id = %id, "schedule has no further runs");
            break;
        };
        tokio::time::sleep(until(fire_at)).await;

        let following = match &spec {
            ScheduleSpec::Recurring(_) => spec.next_after(fire_at),
            ScheduleSpec::OneShot(_) => None,
        };
        {
            let mut entries = lock(&entries);
            let ours = entries.get(&id).is_some_and(|e| e.generation == generation);
            if !ours {
                return;
            }
            if following.is_none() {
                entries.remove(&id);
            } else if let Some(entry) = entries.get_mut(&id) {
                entry.info.last_run = Some(now());
                entry.info.next_run = following;
            }
        }

        tracing::debug!(automation_id = %id, %fire_at, trigger = %trigger_type, "timer fired");
        let event = TriggerEvent::scheduled(
            trigger_type,
            id,
            json!({"scheduledAt": fire_at.to_rfc3339()}),
        );
        if triggers.send(event).is_err() {
            tracing::debug!(automation_id = %id, "trigger channel closed, stopping timer");
            break;
        }
        if following.is_none() {
            return;
        }
        cursor = fire_at;
    }
    let mut entries = lock(&entries);
    if entries.get(&id).is_some_and(|e| e.generation == generation) {
        entries.remove(&id);
    }
}
