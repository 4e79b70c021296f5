//! Automation engine — routes trigger events to cached definitions and runs
//! them through guard, conditions and actions.
//!
//! Trigger events arrive from three places: the scheduler (targeted
//! `CRON`/`TIME` fires), inbound bus events bridged by
//! [`AutomationEngine::handle_bus_event`], and [`AutomationEngine::execute_manual`].
//! Every run, including a rejected one, ends in a persisted
//! [`ExecutionResult`] and a lifecycle event on the bus.

use std::sync::Arc;

use flowhub_domain::automation::{AutomationDefinition, TriggerEvent};
use flowhub_domain::error::{FlowHubError, NotFoundError, ValidationError};
use flowhub_domain::event::{Event, EventType};
use flowhub_domain::execution::{ExecutionContext, ExecutionResult, ExecutionStatus};
use flowhub_domain::id::AutomationId;
use flowhub_domain::time::now;
use futures::future::join_all;
use serde_json::{Value, json};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::evaluator::evaluate_group;
use crate::executor::{ActionExecutor, TOP_LEVEL_PREFIX};
use crate::guard::ConcurrencyGuard;
use crate::ports::{AgentRunner, AutomationRepository, EventPublisher, HttpClient};
use crate::registry::DefinitionRegistry;
use crate::scheduler::Scheduler;

/// User id recorded on runs whose trigger payload carries no `userId`.
pub const SYSTEM_USER: &str = "system";

/// Error text of a run whose condition group did not hold.
pub const CONDITIONS_NOT_MET: &str = "Conditions not met";

/// Reactive engine that turns trigger events into automation runs.
pub struct AutomationEngine<R, A, H, P> {
    repo: R,
    registry: Arc<DefinitionRegistry>,
    guard: ConcurrencyGuard,
    executor: Arc<ActionExecutor<A, H, P>>,
    scheduler: Option<Arc<Scheduler>>,
}

impl<R, A, H, P> AutomationEngine<R, A, H, P>
where
    R: AutomationRepository + Send + Sync,
    A: AgentRunner + Send + Sync,
    H: HttpClient + Send + Sync,
    P: EventPublisher + Send + Sync,
{
    /// Create a new engine.
    pub fn new(
        repo: R,
        registry: Arc<DefinitionRegistry>,
        executor: Arc<ActionExecutor<A, H, P>>,
    ) -> Self {
        Self {
            repo,
            registry,
            guard: ConcurrencyGuard::new(),
            executor,
            scheduler: None,
        }
    }

    /// Keep `scheduler` in step with every reload.
    #[must_use]
    pub fn with_scheduler(mut self, scheduler: Arc<Scheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn registry(&self) -> &Arc<DefinitionRegistry> {
        &self.registry
    }

    pub fn guard(&self) -> &ConcurrencyGuard {
        &self.guard
    }

    /// Refresh the whole cache from the repository.
    ///
    /// # Errors
    ///
    /// Returns the repository error; the cache is left untouched.
    #[tracing::instrument(skip(self))]
    pub async fn reload_all(&self) -> Result<usize, FlowHubError> {
        let definitions = self.repo.get_active().await?;
        let mut valid = Vec::with_capacity(definitions.len());
        for definition in definitions {
            match definition.validate() {
                Ok(()) => valid.push(definition),
                Err(err) => {
                    tracing::warn!(
                        automation_id = %definition.id,
                        err = %err.to_chain_string(),
                        "skipping invalid definition"
                    );
                }
            }
        }
        let count = valid.len();
        if let Some(scheduler) = &self.scheduler {
            let armed = scheduler.sync(&valid);
            tracing::debug!(armed, "timers re-armed");
        }
        self.registry.replace_all(valid);
        tracing::info!(count, "automation definitions loaded");
        Ok(count)
    }

    /// Refresh one definition; a deleted or deactivated one is evicted and
    /// its timer disarmed.
    ///
    /// A cron expression that does not parse leaves the definition cached
    /// but unscheduled.
    ///
    /// # Errors
    ///
    /// Returns the repository error.
    #[tracing::instrument(skip(self))]
    pub async fn reload(
        &self,
        id: AutomationId,
    ) -> Result<Option<AutomationDefinition>, FlowHubError> {
        match self.repo.get_by_id(id).await? {
            Some(definition) if definition.is_active => {
                definition.validate()?;
                if let Some(scheduler) = &self.scheduler {
                    // Failures are logged by the scheduler.
                    let _ = scheduler.update(&definition);
                }
                self.registry.upsert(definition.clone());
                Ok(Some(definition))
            }
            Some(definition) => {
                self.unschedule(id);
                self.registry.remove(id);
                Ok(Some(definition))
            }
            None => {
                self.unschedule(id);
                self.registry.remove(id);
                self.guard.forget(id);
                Ok(None)
            }
        }
    }

    fn unschedule(&self, id: AutomationId) {
        if let Some(scheduler) = &self.scheduler {
            scheduler.remove(id);
        }
    }

    /// Run every cached definition whose trigger matches `event`, concurrently.
    #[tracing::instrument(skip(self, event), fields(trigger = %event.trigger_type))]
    pub async fn route(&self, event: TriggerEvent) -> Vec<ExecutionResult> {
        let matched = self.registry.matching(&event);
        if matched.is_empty() {
            tracing::trace!("no definition matched");
            return Vec::new();
        }
        join_all(matched.iter().map(|definition| self.run(definition, &event))).await
    }

    /// Run one definition by id, regardless of its trigger type.
    ///
    /// # Errors
    ///
    /// Returns [`FlowHubError::NotFound`] for an unknown id and
    /// [`ValidationError::Inactive`] for an inactive definition.
    #[tracing::instrument(skip(self, payload))]
    pub async fn execute_manual(
        &self,
        id: AutomationId,
        payload: Value,
    ) -> Result<ExecutionResult, FlowHubError> {
        let definition = match self.registry.get(id) {
            Some(definition) => definition,
            None => self.repo.get_by_id(id).await?.ok_or_else(|| NotFoundError {
                entity: "Automation",
                id: id.to_string(),
            })?,
        };
        if !definition.is_active {
            return Err(ValidationError::Inactive(definition.name).into());
        }
        Ok(self
            .run(&definition, &TriggerEvent::manual(id, payload))
            .await)
    }

    /// Bridge a bus event into the router.
    ///
    /// Only inbound kinds are considered, and a named event only when some
    /// cached `EVENT` trigger listens for it.
    pub async fn handle_bus_event(&self, event: &Event) -> Vec<ExecutionResult> {
        if !event.event_type.is_inbound() {
            return Vec::new();
        }
        if let EventType::Named(name) = &event.event_type
            && !self.registry.is_interested(name)
        {
            return Vec::new();
        }
        match TriggerEvent::from_bus_event(event) {
            Some(trigger) => self.route(trigger).await,
            None => {
                tracing::debug!(event = %event.event_type, "inbound event not routable");
                Vec::new()
            }
        }
    }

    /// Guard → conditions → actions, then stamp, publish and persist.
    async fn run(
        &self,
        definition: &AutomationDefinition,
        event: &TriggerEvent,
    ) -> ExecutionResult {
        let triggered_by = event.triggered_by();
        let permit = match self.guard.try_acquire(definition, now()) {
            Ok(permit) => permit,
            Err(rejection) => {
                tracing::debug!(automation_id = %definition.id, %rejection, "run rejected");
                let result =
                    ExecutionResult::cancelled(definition.id, triggered_by, rejection.to_string());
                self.finish(definition, result.clone()).await;
                return result;
            }
        };

        self.publish(
            EventType::AutomationTriggered,
            definition,
            json!({"triggeredBy": triggered_by}),
        )
        .await;

        let mut result = ExecutionResult::start(definition.id, triggered_by.clone());
        let mut ctx = ExecutionContext::new(
            user_of(&event.data),
            definition.id.to_string(),
            triggered_by,
            event.data.clone(),
        );

        let conditions_met = definition
            .conditions
            .as_ref()
            .is_none_or(|group| evaluate_group(group, &ctx.scope()));
        if conditions_met {
            let list = self
                .executor
                .run_ordered_actions(&definition.actions, &mut ctx, TOP_LEVEL_PREFIX)
                .await;
            result.actions_executed = list.outcomes.len();
            result.outcomes = list.outcomes;
            match list.halted {
                None => result.finish(ExecutionStatus::Completed, None),
                Some((key, message)) => {
                    result.finish(
                        ExecutionStatus::Failed,
                        Some(format!("{key} failed: {message}")),
                    );
                }
            }
        } else {
            result.finish(ExecutionStatus::Cancelled, Some(CONDITIONS_NOT_MET.to_string()));
        }

        let at = permit.release();
        self.registry.record_run(definition.id, at);
        if let Err(err) = self.repo.record_run(definition.id, at).await {
            tracing::warn!(
                automation_id = %definition.id,
                err = %err.to_chain_string(),
                "failed to record run"
            );
        }

        self.finish(definition, result.clone()).await;
        result
    }

    async fn finish(&self, definition: &AutomationDefinition, result: ExecutionResult) {
        let event_type = match result.status {
            ExecutionStatus::Completed => EventType::AutomationCompleted,
            ExecutionStatus::Failed => EventType::AutomationFailed,
            ExecutionStatus::Cancelled | ExecutionStatus::Running => EventType::AutomationCancelled,
        };
        tracing::info!(
            automation_id = %definition.id,
            status = %result.status,
            actions = result.actions_executed,
            error = result.error.as_deref().unwrap_or(""),
            "automation run finished"
        );
        self.publish(
            event_type,
            definition,
            json!({
                "status": result.status,
                "triggeredBy": result.triggered_by,
                "actionsExecuted": result.actions_executed,
                "error": result.error,
            }),
        )
        .await;
        if let Err(err) = self.repo.append_run_log(result).await {
            tracing::warn!(
                automation_id = %definition.id,
                err = %err.to_chain_string(),
                "failed to persist run log"
            );
        }
    }

    async fn publish(
        &self,
        event_type: EventType,
        definition: &AutomationDefinition,
        mut data: Value,
    ) {
        if let Value::Object(map) = &mut data {
            map.insert("automationId".to_string(), json!(definition.id));
            map.insert("automationName".to_string(), json!(definition.name));
        }
        if let Err(err) = self
            .executor
            .publisher()
            .publish(Event::new(event_type, data))
            .await
        {
            tracing::warn!(err = %err.to_chain_string(), "failed to publish lifecycle event");
        }
    }
}

impl<R, A, H, P> AutomationEngine<R, A, H, P>
where
    R: AutomationRepository + Send + Sync + 'static,
    A: AgentRunner + Send + Sync + 'static,
    H: HttpClient + Send + Sync + 'static,
    P: EventPublisher + Send + Sync + 'static,
{
    /// Spawn the listener task feeding the router.
    ///
    /// Each delivery runs on its own task so a slow run never holds up the
    /// next event. The task ends when both channels are closed.
    pub fn spawn_listener(
        self: Arc<Self>,
        mut bus: broadcast::Receiver<Event>,
        mut triggers: mpsc::UnboundedReceiver<TriggerEvent>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut bus_open = true;
            loop {
                tokio::select! {
                    received = bus.recv(), if bus_open => match received {
                        Ok(event) => {
                            let engine = Arc::clone(&self);
                            tokio::spawn(async move {
                                engine.handle_bus_event(&event).await;
                            });
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(
                                skipped,
                                "automation engine lagged behind the event bus"
                            );
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            bus_open = false;
                        }
                    },
                    trigger = triggers.recv() => match trigger {
                        Some(trigger) => {
                            let engine = Arc::clone(&self);
                            tokio::spawn(async move {
                                engine.route(trigger).await;
                            });
                        }
                        None => break,
                    },
                }
            }
            tracing::debug!("automation engine listener stopped");
        })
    }
}

fn user_of(data: &Value) -> String {
    data.get("userId")
        .and_then(Value::as_str)
        .unwrap_or(SYSTEM_USER)
        .to_string()
}
