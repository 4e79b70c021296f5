//! In-memory fakes of the port traits, shared by the unit tests.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use flowhub_domain::automation::AutomationDefinition;
use flowhub_domain::error::{FlowHubError, NotFoundError};
use flowhub_domain::event::{Event, EventType};
use flowhub_domain::execution::ExecutionResult;
use flowhub_domain::id::{AutomationId, WorkflowId};
use flowhub_domain::time::Timestamp;
use flowhub_domain::workflow::{WorkflowDefinition, WorkflowExecutionLog, WorkflowStatus};
use serde_json::{Value, json};

use crate::executor::ActionExecutor;
use crate::ports::{
    AgentRequest, AgentRunner, AutomationRepository, EventPublisher, HttpClient, HttpRequest,
    HttpResponse, WorkflowRepository,
};

// ── Spy publisher ──────────────────────────────────────────────

#[derive(Default)]
pub struct SpyPublisher {
    pub events: Mutex<Vec<Event>>,
}

impl SpyPublisher {
    pub fn of_type(&self, event_type: &EventType) -> Vec<Event> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| &e.event_type == event_type)
            .cloned()
            .collect()
    }
}

impl EventPublisher for SpyPublisher {
    fn publish(&self, event: Event) -> impl Future<Output = Result<(), FlowHubError>> + Send {
        self.events.lock().unwrap().push(event);
        async { Ok(()) }
    }
}

// ── Recording HTTP client ──────────────────────────────────────

pub struct RecordingHttp {
    pub requests: Mutex<Vec<HttpRequest>>,
    pub status: u16,
    pub body: Value,
    /// Never answer.
    pub stall: bool,
}

impl Default for RecordingHttp {
    fn default() -> Self {
        Self::responding(200, json!({"ok": true}))
    }
}

impl RecordingHttp {
    pub fn responding(status: u16, body: Value) -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            status,
            body,
            stall: false,
        }
    }

    pub fn stalled() -> Self {
        Self {
            stall: true,
            ..Self::default()
        }
    }

    pub fn urls(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.url.clone())
            .collect()
    }
}

impl HttpClient for RecordingHttp {
    fn send(
        &self,
        request: HttpRequest,
    ) -> impl Future<Output = Result<HttpResponse, FlowHubError>> + Send {
        self.requests.lock().unwrap().push(request);
        let response = HttpResponse {
            status: self.status,
            body: self.body.clone(),
        };
        let stall = self.stall;
        async move {
            if stall {
                std::future::pending::<()>().await;
            }
            Ok(response)
        }
    }
}

// ── Echo agent ─────────────────────────────────────────────────

#[derive(Default)]
pub struct EchoAgent {
    pub requests: Mutex<Vec<AgentRequest>>,
}

impl AgentRunner for EchoAgent {
    fn run(
        &self,
        request: AgentRequest,
    ) -> impl Future<Output = Result<Value, FlowHubError>> + Send {
        let reply = json!({"content": format!("echo: {}", request.input)});
        self.requests.lock().unwrap().push(request);
        async { Ok(reply) }
    }
}

pub type TestExecutor = ActionExecutor<Arc<EchoAgent>, Arc<RecordingHttp>, Arc<SpyPublisher>>;

pub struct Fakes {
    pub agent: Arc<EchoAgent>,
    pub http: Arc<RecordingHttp>,
    pub publisher: Arc<SpyPublisher>,
}

impl Fakes {
    pub fn new(http: RecordingHttp) -> Self {
        Self {
            agent: Arc::new(EchoAgent::default()),
            http: Arc::new(http),
            publisher: Arc::new(SpyPublisher::default()),
        }
    }

    pub fn executor(&self) -> TestExecutor {
        ActionExecutor::new(
            Arc::clone(&self.agent),
            Arc::clone(&self.http),
            Arc::clone(&self.publisher),
        )
    }
}

// ── In-memory automation repo ──────────────────────────────────

#[derive(Default)]
pub struct InMemoryAutomationRepo {
    pub store: Mutex<HashMap<AutomationId, AutomationDefinition>>,
    pub logs: Mutex<Vec<ExecutionResult>>,
}

impl InMemoryAutomationRepo {
    pub fn with(definitions: Vec<AutomationDefinition>) -> Self {
        Self {
            store: Mutex::new(definitions.into_iter().map(|d| (d.id, d)).collect()),
            logs: Mutex::new(Vec::new()),
        }
    }

    pub fn insert(&self, definition: AutomationDefinition) {
        self.store.lock().unwrap().insert(definition.id, definition);
    }

    pub fn logs(&self) -> Vec<ExecutionResult> {
        self.logs.lock().unwrap().clone()
    }
}

impl AutomationRepository for InMemoryAutomationRepo {
    fn get_active(
        &self,
    ) -> impl Future<Output = Result<Vec<AutomationDefinition>, FlowHubError>> + Send {
        let r: Vec<_> = self
            .store
            .lock()
            .unwrap()
            .values()
            .filter(|d| d.is_active)
            .cloned()
            .collect();
        async { Ok(r) }
    }

    fn get_by_id(
        &self,
        id: AutomationId,
    ) -> impl Future<Output = Result<Option<AutomationDefinition>, FlowHubError>> + Send {
        let r = self.store.lock().unwrap().get(&id).cloned();
        async { Ok(r) }
    }

    fn record_run(
        &self,
        id: AutomationId,
        at: Timestamp,
    ) -> impl Future<Output = Result<(), FlowHubError>> + Send {
        let mut store = self.store.lock().unwrap();
        let r = match store.get_mut(&id) {
            Some(def) => {
                def.run_count += 1;
                def.last_run = Some(at);
                Ok(())
            }
            None => Err(NotFoundError {
                entity: "Automation",
                id: id.to_string(),
            }
            .into()),
        };
        async { r }
    }

    fn append_run_log(
        &self,
        result: ExecutionResult,
    ) -> impl Future<Output = Result<(), FlowHubError>> + Send {
        self.logs.lock().unwrap().push(result);
        async { Ok(()) }
    }
}

// ── In-memory workflow repo ────────────────────────────────────

#[derive(Default)]
pub struct InMemoryWorkflowRepo {
    pub store: Mutex<HashMap<WorkflowId, WorkflowDefinition>>,
    pub logs: Mutex<Vec<WorkflowExecutionLog>>,
}

impl InMemoryWorkflowRepo {
    pub fn with(definitions: Vec<WorkflowDefinition>) -> Self {
        Self {
            store: Mutex::new(definitions.into_iter().map(|d| (d.id, d)).collect()),
            logs: Mutex::new(Vec::new()),
        }
    }

    pub fn logs(&self) -> Vec<WorkflowExecutionLog> {
        self.logs.lock().unwrap().clone()
    }
}

impl WorkflowRepository for InMemoryWorkflowRepo {
    fn get_by_id(
        &self,
        id: WorkflowId,
    ) -> impl Future<Output = Result<Option<WorkflowDefinition>, FlowHubError>> + Send {
        let r = self.store.lock().unwrap().get(&id).cloned();
        async { Ok(r) }
    }

    fn get_active(
        &self,
    ) -> impl Future<Output = Result<Vec<WorkflowDefinition>, FlowHubError>> + Send {
        let r: Vec<_> = self
            .store
            .lock()
            .unwrap()
            .values()
            .filter(|d| d.status == WorkflowStatus::Active)
            .cloned()
            .collect();
        async { Ok(r) }
    }

    fn append_execution_log(
        &self,
        log: WorkflowExecutionLog,
    ) -> impl Future<Output = Result<(), FlowHubError>> + Send {
        self.logs.lock().unwrap().push(log);
        async { Ok(()) }
    }
}
