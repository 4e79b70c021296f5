//! Concurrency guard — at most one run per automation, with cooldown and
//! run-ceiling checks.
//!
//! Check and lock happen in one critical section, so concurrent deliveries
//! of the same trigger cannot both pass.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use flowhub_domain::automation::AutomationDefinition;
use flowhub_domain::id::AutomationId;
use flowhub_domain::time::{Timestamp, now};

/// Why a run was not started. The display text is recorded as the
/// `CANCELLED` result's error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("Already running")]
    AlreadyRunning,
    #[error("In cooldown")]
    InCooldown,
    #[error("Max runs reached")]
    MaxRunsReached,
}

#[derive(Debug, Default)]
struct GuardState {
    running: HashSet<AutomationId>,
    last_run: HashMap<AutomationId, Timestamp>,
    run_counts: HashMap<AutomationId, u32>,
}

#[derive(Debug, Clone, Default)]
pub struct ConcurrencyGuard {
    state: Arc<Mutex<GuardState>>,
}

impl ConcurrencyGuard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, GuardState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Admit a run of `definition` at `at`, or say why not.
    ///
    /// Stored `last_run` / `run_count` are honoured; the guard keeps the
    /// later / higher of its own value and the stored one.
    ///
    /// # Errors
    ///
    /// Returns the first failing check, in order: already running, in
    /// cooldown, run ceiling reached.
    pub fn try_acquire(
        &self,
        definition: &AutomationDefinition,
        at: Timestamp,
    ) -> Result<RunPermit, Rejection> {
        let id = definition.id;
        let mut state = self.lock();
        if state.running.contains(&id) {
            return Err(Rejection::AlreadyRunning);
        }

        let last_run = state.last_run.get(&id).copied().max(definition.last_run);
        if let Some(last_run) = last_run {
            let cooldown_ms =
                i64::try_from(definition.cooldown_seconds.saturating_mul(1000)).unwrap_or(i64::MAX);
            if cooldown_ms > 0 && (at - last_run).num_milliseconds() < cooldown_ms {
                return Err(Rejection::InCooldown);
            }
        }

        let run_count = state
            .run_counts
            .get(&id)
            .copied()
            .unwrap_or_default()
            .max(definition.run_count);
        if definition.max_runs > 0 && run_count >= definition.max_runs {
            return Err(Rejection::MaxRunsReached);
        }

        state.run_counts.insert(id, run_count);
        if let Some(last_run) = last_run {
            state.last_run.insert(id, last_run);
        }
        state.running.insert(id);
        Ok(RunPermit {
            id,
            state: Arc::clone(&self.state),
            released: false,
        })
    }

    #[must_use]
    pub fn is_running(&self, id: AutomationId) -> bool {
        self.lock().running.contains(&id)
    }

    #[must_use]
    pub fn run_count(&self, id: AutomationId) -> u32 {
        self.lock().run_counts.get(&id).copied().unwrap_or_default()
    }

    #[must_use]
    pub fn last_run(&self, id: AutomationId) -> Option<Timestamp> {
        self.lock().last_run.get(&id).copied()
    }

    /// Drop everything known about `id` (the definition was deleted).
    pub fn forget(&self, id: AutomationId) {
        let mut state = self.lock();
        state.last_run.remove(&id);
        state.run_counts.remove(&id);
    }
}

/// Exclusive right to run one automation.
///
/// Releasing it, explicitly or by drop (including during a panic), unlocks
/// the id, stamps `last_run` and increments the run count.
#[derive(Debug)]
pub struct RunPermit {
    id: AutomationId,
    state: Arc<Mutex<GuardState>>,
    released: bool,
}

impl RunPermit {
    #[must_use]
    pub fn id(&self) -> AutomationId {
        self.id
    }

    /// Release now and return the `last_run` stamp.
    pub fn release(mut self) -> Timestamp {
        self.stamp()
    }

    fn stamp(&mut self) -> Timestamp {
        let at = now();
        if !self.released {
            self.released = true;
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            state.running.remove(&self.id);
            state.last_run.insert(self.id, at);
            *state.run_counts.entry(self.id).or_default() += 1;
        }
        at
    }
}

impl Drop for RunPermit {
    fn drop(&mut self) {
        self.stamp();
    }
}
