//! Workflow runtime — walks a node graph one node at a time.
//!
//! Runs are detached tasks. Their state lives in an execution map that
//! callers poll with [`WorkflowRuntime::get_execution`]; terminal entries
//! are dropped after the retention window.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use flowhub_domain::error::{FlowHubError, NotFoundError, ValidationError};
use flowhub_domain::event::{Event, EventType};
use flowhub_domain::execution::{ExecutionContext, ExecutionStatus};
use flowhub_domain::id::{ExecutionId, WorkflowId};
use flowhub_domain::workflow::{
    NodeKind, ParsedWorkflow, WorkflowDefinition, WorkflowExecution, WorkflowNode,
};
use serde_json::{Value, json};

use crate::evaluator::evaluate_group;
use crate::executor::ActionExecutor;
use crate::ports::{AgentRunner, EventPublisher, HttpClient, WorkflowRepository};

/// Upper bound on node visits per execution.
pub const MAX_STEPS: usize = 1000;

/// How long a terminal execution stays pollable.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(3600);

type Executions = Arc<Mutex<HashMap<ExecutionId, WorkflowExecution>>>;

fn lock(executions: &Executions) -> MutexGuard<'_, HashMap<ExecutionId, WorkflowExecution>> {
    executions.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Where the loop goes after a node.
enum Step {
    Next(String),
    Done,
}

pub struct WorkflowRuntime<W, A, H, P> {
    repo: W,
    executor: Arc<ActionExecutor<A, H, P>>,
    workflows: RwLock<HashMap<WorkflowId, ParsedWorkflow>>,
    executions: Executions,
    retention: Duration,
}

impl<W, A, H, P> WorkflowRuntime<W, A, H, P>
where
    W: WorkflowRepository + Send + Sync + 'static,
    A: AgentRunner + Send + Sync + 'static,
    H: HttpClient + Send + Sync + 'static,
    P: EventPublisher + Send + Sync + 'static,
{
    pub fn new(repo: W, executor: Arc<ActionExecutor<A, H, P>>) -> Self {
        Self {
            repo,
            executor,
            workflows: RwLock::new(HashMap::new()),
            executions: Arc::new(Mutex::new(HashMap::new())),
            retention: DEFAULT_RETENTION,
        }
    }

    #[must_use]
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    /// Validate and cache a workflow. Unreachable nodes are logged, not rejected.
    ///
    /// # Errors
    ///
    /// Returns [`FlowHubError::Validation`] when the graph is malformed.
    pub fn register(&self, definition: WorkflowDefinition) -> Result<WorkflowId, FlowHubError> {
        let (workflow, unreachable) = ParsedWorkflow::parse(definition)?;
        if !unreachable.is_empty() {
            tracing::warn!(
                workflow_id = %workflow.id,
                ?unreachable,
                "workflow has unreachable nodes"
            );
        }
        let id = workflow.id;
        self.workflows
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, workflow);
        Ok(id)
    }

    #[must_use]
    pub fn get_workflow(&self, id: WorkflowId) -> Option<ParsedWorkflow> {
        self.workflows
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }

    /// Register every active workflow from the repository. Invalid ones are
    /// skipped with a warning. Returns the number registered.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository cannot be read.
    #[tracing::instrument(skip(self))]
    pub async fn load_active(&self) -> Result<usize, FlowHubError> {
        let definitions = self.repo.get_active().await?;
        let mut loaded = 0;
        for definition in definitions {
            let id = definition.id;
            match self.register(definition) {
                Ok(_) => loaded += 1,
                Err(err) => {
                    tracing::warn!(
                        workflow_id = %id,
                        err = %err.to_chain_string(),
                        "skipping invalid workflow"
                    );
                }
            }
        }
        tracing::info!(loaded, "workflows loaded");
        Ok(loaded)
    }

    /// Refresh one workflow from the repository, dropping it if it is gone.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository fails or the stored graph is invalid.
    pub async fn reload(&self, id: WorkflowId) -> Result<Option<WorkflowId>, FlowHubError> {
        match self.repo.get_by_id(id).await? {
            Some(definition) => self.register(definition).map(Some),
            None => {
                self.workflows
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .remove(&id);
                Ok(None)
            }
        }
    }

    /// Start a detached run of an `ACTIVE` workflow and return its id.
    ///
    /// A workflow missing from the cache is fetched from the repository.
    /// Several runs of one workflow may be in flight at once.
    ///
    /// # Errors
    ///
    /// Returns [`FlowHubError::NotFound`] for an unknown id and
    /// [`ValidationError::Inactive`] when the workflow is not `ACTIVE`.
    #[tracing::instrument(skip(self, trigger_data))]
    pub async fn execute(
        self: &Arc<Self>,
        workflow_id: WorkflowId,
        user_id: &str,
        trigger_data: Value,
    ) -> Result<ExecutionId, FlowHubError> {
        let workflow = match self.get_workflow(workflow_id) {
            Some(workflow) => workflow,
            None => {
                self.reload(workflow_id).await?;
                self.get_workflow(workflow_id).ok_or_else(|| NotFoundError {
                    entity: "Workflow",
                    id: workflow_id.to_string(),
                })?
            }
        };
        if !workflow.is_active() {
            return Err(ValidationError::Inactive(workflow.name).into());
        }

        let ctx = ExecutionContext::new(
            user_id,
            workflow_id.to_string(),
            "workflow",
            trigger_data.clone(),
        );
        let execution = WorkflowExecution::start(&workflow, ctx);
        let execution_id = execution.execution_id;
        lock(&self.executions).insert(execution_id, execution.clone());
        tracing::info!(%execution_id, name = %workflow.name, "workflow execution started");

        let runtime = Arc::clone(self);
        tokio::spawn(async move {
            runtime.drive(workflow, execution, trigger_data).await;
        });
        Ok(execution_id)
    }

    /// Snapshot of an execution, while it is retained.
    #[must_use]
    pub fn get_execution(&self, id: ExecutionId) -> Option<WorkflowExecution> {
        lock(&self.executions).get(&id).cloned()
    }

    async fn drive(
        self: Arc<Self>,
        workflow: ParsedWorkflow,
        mut execution: WorkflowExecution,
        trigger_data: Value,
    ) {
        let outcome = self
            .walk(&workflow, &mut execution, &trigger_data)
            .await;
        match outcome {
            Ok(()) => execution.finish(ExecutionStatus::Completed, None),
            Err(message) => {
                tracing::warn!(
                    execution_id = %execution.execution_id,
                    error = %message,
                    "workflow execution failed"
                );
                execution.finish(ExecutionStatus::Failed, Some(message));
            }
        }
        execution.current_node_id = None;

        if let Err(err) = self.repo.append_execution_log(execution.to_log()).await {
            tracing::warn!(
                execution_id = %execution.execution_id,
                err = %err.to_chain_string(),
                "failed to persist workflow log"
            );
        }

        let event_type = if execution.status == ExecutionStatus::Completed {
            EventType::WorkflowCompleted
        } else {
            EventType::WorkflowFailed
        };
        self.publish(
            event_type,
            json!({
                "workflowId": execution.workflow_id,
                "executionId": execution.execution_id,
                "userId": execution.context.user_id,
                "status": execution.status,
                "history": execution.history,
                "error": execution.error,
            }),
        )
        .await;
        tracing::info!(
            execution_id = %execution.execution_id,
            status = %execution.status,
            steps = execution.history.len(),
            "workflow execution finished"
        );
        self.store(&execution);

        let executions = Arc::clone(&self.executions);
        let execution_id = execution.execution_id;
        let retention = self.retention;
        tokio::spawn(async move {
            tokio::time::sleep(retention).await;
            lock(&executions).remove(&execution_id);
        });
    }

    async fn walk(
        &self,
        workflow: &ParsedWorkflow,
        execution: &mut WorkflowExecution,
        trigger_data: &Value,
    ) -> Result<(), String> {
        let mut visited: HashSet<String> = HashSet::new();
        let mut current = workflow.start_node_id.clone();

        for _ in 0..MAX_STEPS {
            let Some(node) = workflow.nodes.get(&current) else {
                return Err(format!("Node not found: {current}"));
            };
            if !visited.insert(current.clone()) && !node.is_condition() {
                tracing::warn!(
                    execution_id = %execution.execution_id,
                    node_id = %current,
                    "node revisited, stopping execution"
                );
                return Ok(());
            }
            execution.current_node_id = Some(current.clone());
            execution.history.push(current.clone());

            let (result, step) = self
                .visit(node, &mut execution.context, trigger_data)
                .await?;
            execution.node_results.insert(current.clone(), result.clone());
            execution
                .context
                .previous_results
                .insert(current.clone(), result);
            self.store(execution);

            self.publish(
                EventType::WorkflowProgress,
                json!({
                    "workflowId": execution.workflow_id,
                    "executionId": execution.execution_id,
                    "userId": execution.context.user_id,
                    "nodeId": node.id,
                    "nodeType": node.kind.type_name(),
                }),
            )
            .await;

            match step {
                Step::Next(next) => current = next,
                Step::Done => return Ok(()),
            }
        }
        Err(format!("Exceeded maximum of {MAX_STEPS} steps"))
    }

    async fn visit(
        &self,
        node: &WorkflowNode,
        ctx: &mut ExecutionContext,
        trigger_data: &Value,
    ) -> Result<(Value, Step), String> {
        let follow = |index: usize| {
            node.next
                .get(index)
                .cloned()
                .map_or(Step::Done, Step::Next)
        };
        match &node.kind {
            NodeKind::Trigger { .. } => Ok((trigger_data.clone(), follow(0))),
            NodeKind::Action { action } => {
                let outcome = self.executor.execute_action(action, ctx, &node.id).await;
                // A `{success: false}` outcome fails the execution, same as a thrown error.
                if !outcome.success {
                    let message = outcome.error.unwrap_or_default();
                    return Err(format!("Node {} failed: {message}", node.id));
                }
                Ok((outcome.to_value(), follow(0)))
            }
            NodeKind::Condition { conditions } => {
                let met = evaluate_group(conditions, &ctx.scope());
                Ok((
                    json!({"conditionMet": met}),
                    follow(if met { 0 } else { 1 }),
                ))
            }
            NodeKind::End => Ok((json!({"ended": true}), Step::Done)),
        }
    }

    fn store(&self, execution: &WorkflowExecution) {
        lock(&self.executions).insert(execution.execution_id, execution.clone());
    }

    async fn publish(&self, event_type: EventType, data: Value) {
        let event = Event::new(event_type, data);
        if let Err(err) = self.executor.publisher().publish(event).await {
            tracing::warn!(err = %err.to_chain_string(), "failed to publish workflow event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{EchoAgent, Fakes, InMemoryWorkflowRepo, RecordingHttp, SpyPublisher};
    use flowhub_domain::automation::{
        ActionKind, ConditionConfig, ConditionGroup, ConditionOperator, HttpActionConfig,
    };
    use flowhub_domain::workflow::WorkflowStatus;

    type TestRuntime = WorkflowRuntime<
        Arc<InMemoryWorkflowRepo>,
        Arc<EchoAgent>,
        Arc<RecordingHttp>,
        Arc<SpyPublisher>,
    >;

    fn node(id: &str, kind: NodeKind, next: &[&str]) -> WorkflowNode {
        WorkflowNode::new(id, kind, next.iter().map(ToString::to_string).collect())
    }

    fn trigger() -> NodeKind {
        NodeKind::Trigger { config: json!({}) }
    }

    fn delay() -> NodeKind {
        NodeKind::Action {
            action: ActionKind::Delay { delay_ms: 1 }.into(),
        }
    }

    fn is_true(path: &str) -> NodeKind {
        NodeKind::Condition {
            conditions: ConditionGroup::all(vec![ConditionConfig::new(
                path,
                ConditionOperator::IsTrue,
                None,
            )]),
        }
    }

    fn workflow(nodes: Vec<WorkflowNode>) -> WorkflowDefinition {
        WorkflowDefinition {
            id: WorkflowId::new(),
            name: "Flow".to_string(),
            status: WorkflowStatus::Active,
            nodes,
        }
    }

    fn runtime(
        http: RecordingHttp,
        definitions: Vec<WorkflowDefinition>,
    ) -> (Arc<TestRuntime>, Fakes, Arc<InMemoryWorkflowRepo>) {
        let fakes = Fakes::new(http);
        let repo = Arc::new(InMemoryWorkflowRepo::with(definitions));
        let runtime = WorkflowRuntime::new(Arc::clone(&repo), Arc::new(fakes.executor()));
        (Arc::new(runtime), fakes, repo)
    }

    async fn wait_terminal(runtime: &TestRuntime, id: ExecutionId) -> WorkflowExecution {
        for _ in 0..500 {
            if let Some(execution) = runtime.get_execution(id)
                && execution.status.is_terminal()
            {
                return execution;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("execution {id} never finished");
    }

    #[tokio::test]
    async fn should_follow_true_branch_when_condition_holds() {
        let def = workflow(vec![
            node("start", trigger(), &["check"]),
            node("check", is_true("$ready"), &["a", "b"]),
            node("a", delay(), &["end"]),
            node("b", delay(), &["end"]),
            node("end", NodeKind::End, &[]),
        ]);
        let id = def.id;
        let (runtime, fakes, repo) = runtime(RecordingHttp::default(), vec![def]);

        let execution_id = runtime
            .execute(id, "user-1", json!({"ready": true}))
            .await
            .unwrap();
        let execution = wait_terminal(&runtime, execution_id).await;

        assert_eq!(execution.status, ExecutionStatus::Completed);
        assert_eq!(execution.history, vec!["start", "check", "a", "end"]);
        assert_eq!(execution.node_results["check"], json!({"conditionMet": true}));
        assert_eq!(execution.node_results["start"], json!({"ready": true}));
        assert!(execution.current_node_id.is_none());
        assert_eq!(fakes.publisher.of_type(&EventType::WorkflowProgress).len(), 4);
        assert_eq!(fakes.publisher.of_type(&EventType::WorkflowCompleted).len(), 1);
        assert_eq!(repo.logs().len(), 1);
        assert_eq!(repo.logs()[0].user_id, "user-1");
    }

    #[tokio::test]
    async fn should_take_false_branch_or_stop_without_one() {
        let def = workflow(vec![
            node("start", trigger(), &["check"]),
            node("check", is_true("$ready"), &["a"]),
            node("a", delay(), &["end"]),
            node("end", NodeKind::End, &[]),
        ]);
        let id = def.id;
        let (runtime, _fakes, _repo) = runtime(RecordingHttp::default(), vec![def]);

        let execution_id = runtime.execute(id, "u", json!({})).await.unwrap();
        let execution = wait_terminal(&runtime, execution_id).await;
        assert_eq!(execution.status, ExecutionStatus::Completed);
        assert_eq!(execution.history, vec!["start", "check"]);
    }

    #[tokio::test]
    async fn should_stop_when_action_node_revisits_earlier_node() {
        let def = workflow(vec![
            node("start", trigger(), &["a"]),
            node("a", delay(), &["b"]),
            node("b", delay(), &["a"]),
            node("end", NodeKind::End, &[]),
        ]);
        let id = def.id;
        let (runtime, _fakes, _repo) = runtime(RecordingHttp::default(), vec![def]);

        let execution_id = runtime.execute(id, "u", json!({})).await.unwrap();
        let execution = wait_terminal(&runtime, execution_id).await;
        assert_eq!(execution.history, vec!["start", "a", "b"]);
        assert_eq!(execution.status, ExecutionStatus::Completed);
    }

    #[tokio::test]
    async fn should_fail_at_step_ceiling_when_condition_loops() {
        let def = workflow(vec![
            node("start", trigger(), &["spin"]),
            node("spin", is_true("$forever"), &["spin"]),
            node("end", NodeKind::End, &[]),
        ]);
        let id = def.id;
        let (runtime, fakes, _repo) = runtime(RecordingHttp::default(), vec![def]);

        let execution_id = runtime
            .execute(id, "u", json!({"forever": true}))
            .await
            .unwrap();
        let execution = wait_terminal(&runtime, execution_id).await;
        assert_eq!(execution.status, ExecutionStatus::Failed);
        assert_eq!(execution.history.len(), MAX_STEPS);
        assert!(execution.error.unwrap().contains("maximum"));
        assert_eq!(fakes.publisher.of_type(&EventType::WorkflowFailed).len(), 1);
    }

    #[tokio::test]
    async fn should_fail_when_action_node_fails() {
        let def = workflow(vec![
            node("start", trigger(), &["call"]),
            node(
                "call",
                NodeKind::Action {
                    action: ActionKind::ApiCall(HttpActionConfig {
                        url: "https://api.example.com/x".to_string(),
                        ..HttpActionConfig::default()
                    })
                    .into(),
                },
                &["end"],
            ),
            node("end", NodeKind::End, &[]),
        ]);
        let id = def.id;
        let (runtime, _fakes, repo) =
            runtime(RecordingHttp::responding(500, json!({})), vec![def]);

        let execution_id = runtime.execute(id, "u", json!({})).await.unwrap();
        let execution = wait_terminal(&runtime, execution_id).await;
        assert_eq!(execution.status, ExecutionStatus::Failed);
        assert!(execution.error.unwrap().starts_with("Node call failed"));
        assert_eq!(execution.history, vec!["start", "call"]);
        assert_eq!(repo.logs()[0].status, ExecutionStatus::Failed);
    }

    #[tokio::test]
    async fn should_reject_inactive_and_unknown_workflows() {
        let mut draft = workflow(vec![
            node("start", trigger(), &["end"]),
            node("end", NodeKind::End, &[]),
        ]);
        draft.status = WorkflowStatus::Draft;
        let draft_id = draft.id;
        let (runtime, _fakes, _repo) = runtime(RecordingHttp::default(), vec![]);
        runtime.register(draft).unwrap();

        assert!(matches!(
            runtime.execute(draft_id, "u", json!({})).await,
            Err(FlowHubError::Validation(ValidationError::Inactive(_)))
        ));
        assert!(matches!(
            runtime.execute(WorkflowId::new(), "u", json!({})).await,
            Err(FlowHubError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn should_load_only_valid_active_workflows() {
        let valid = workflow(vec![
            node("start", trigger(), &["end"]),
            node("end", NodeKind::End, &[]),
        ]);
        let broken = workflow(vec![node("start", trigger(), &[])]);
        let (runtime, _fakes, _repo) =
            runtime(RecordingHttp::default(), vec![valid.clone(), broken]);

        assert_eq!(runtime.load_active().await.unwrap(), 1);
        assert!(runtime.get_workflow(valid.id).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn should_dispose_execution_after_retention() {
        let def = workflow(vec![
            node("start", trigger(), &["end"]),
            node("end", NodeKind::End, &[]),
        ]);
        let id = def.id;
        let fakes = Fakes::new(RecordingHttp::default());
        let repo = Arc::new(InMemoryWorkflowRepo::with(vec![def]));
        let runtime = Arc::new(
            WorkflowRuntime::new(repo, Arc::new(fakes.executor()))
                .with_retention(Duration::from_secs(60)),
        );

        let execution_id = runtime.execute(id, "u", json!({})).await.unwrap();
        wait_terminal(&runtime, execution_id).await;
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(runtime.get_execution(execution_id).is_some());
        tokio::time::sleep(Duration::from_secs(31)).await;
        assert!(runtime.get_execution(execution_id).is_none());
    }
}
