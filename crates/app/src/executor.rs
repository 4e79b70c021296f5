//! Action executor — runs one action, or an ordered list of them, against a
//! mutable execution context.
//!
//! The action tree is recursive (`CONDITION` and `LOOP` own child lists), so
//! [`ActionExecutor::execute_action`] returns a boxed future and
//! [`ActionExecutor::run_ordered_actions`] calls back into it.
//!
//! Every action runs inside a failure boundary: errors never escape, they
//! become an [`ActionOutcome`] with `success = false`.

use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};

use flowhub_domain::automation::{
    ActionConfig, ActionKind, ActionType, HttpActionConfig, HttpMethod, sorted_by_order,
};
use flowhub_domain::error::FlowHubError;
use flowhub_domain::event::{Event, EventType};
use flowhub_domain::execution::{ActionOutcome, ExecutionContext};
use flowhub_domain::time::now;
use serde_json::{Map, Value, json};

use crate::evaluator::evaluate_group;
use crate::ports::{AgentRequest, AgentRunner, EventPublisher, HttpClient, HttpRequest};
use crate::resolver::{interpolate, interpolate_value, lookup};
use crate::script::{ScriptError, evaluate_script};

/// Upper bound on one outbound HTTP call.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Prefix of the `previous_results` keys written for a top-level action list.
pub const TOP_LEVEL_PREFIX: &str = "action";

/// Upper bound on the passes a single `LOOP` action may make.
pub const MAX_LOOP_ITERATIONS: usize = 10_000;

/// Why a single action failed.
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("agent call failed")]
    Agent(#[source] FlowHubError),

    #[error("request failed")]
    Request(#[source] FlowHubError),

    #[error("request to {url} timed out after {}s", timeout.as_secs())]
    Timeout { url: String, timeout: Duration },

    #[error("{method} {url} returned HTTP {status}")]
    Status {
        method: HttpMethod,
        url: String,
        status: u16,
    },

    #[error("`{0}` does not resolve to an array")]
    NotIterable(String),

    #[error("loop needs `iterations` or `iterate_over`")]
    NoIterations,

    #[error("loop of {count} iterations exceeds the limit of {limit}")]
    TooManyIterations { count: usize, limit: usize },

    #[error("script failed")]
    Script(#[from] ScriptError),

    /// A child action inside a `CONDITION` or `LOOP` failed.
    #[error("nested action {key} failed: {message}")]
    Nested { key: String, message: String },
}

impl ActionError {
    /// Message plus source chain, `a: b: c`.
    #[must_use]
    pub fn to_chain_string(&self) -> String {
        let mut out = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(err) = source {
            out.push_str(": ");
            out.push_str(&err.to_string());
            source = err.source();
        }
        out
    }
}

/// Outcomes of an ordered action list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListOutcome {
    pub outcomes: Vec<ActionOutcome>,
    /// Key and error of the action that halted the list.
    pub halted: Option<(String, String)>,
}

impl ListOutcome {
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.halted.is_none()
    }

    fn results(&self) -> Vec<Value> {
        self.outcomes.iter().map(ActionOutcome::to_value).collect()
    }
}

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Executes actions through the agent, HTTP and event-bus ports.
pub struct ActionExecutor<A, H, P> {
    agent: A,
    http: H,
    publisher: P,
    http_timeout: Duration,
}

impl<A, H, P> ActionExecutor<A, H, P>
where
    A: AgentRunner + Send + Sync,
    H: HttpClient + Send + Sync,
    P: EventPublisher + Send + Sync,
{
    /// Create an executor with the default 30 s HTTP bound.
    pub fn new(agent: A, http: H, publisher: P) -> Self {
        Self {
            agent,
            http,
            publisher,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    /// The bus effect events are published on.
    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    /// Run `actions` in `order`, storing each outcome in
    /// `previous_results["<prefix>_<n>"]`.
    ///
    /// The first failing non-`CONDITION` action halts the list. A failed
    /// `CONDITION` is recorded and the list goes on.
    pub async fn run_ordered_actions(
        &self,
        actions: &[ActionConfig],
        ctx: &mut ExecutionContext,
        prefix: &str,
    ) -> ListOutcome {
        let mut list = ListOutcome::default();
        for (index, action) in sorted_by_order(actions).into_iter().enumerate() {
            let key = format!("{prefix}_{index}");
            let outcome = self.execute_action(action, ctx, &key).await;
            ctx.previous_results.insert(key.clone(), outcome.to_value());

            let halts = !outcome.success && action.action_type() != ActionType::Condition;
            if halts {
                let message = outcome.error.clone().unwrap_or_default();
                list.halted = Some((key, message));
            }
            list.outcomes.push(outcome);
            if halts {
                break;
            }
        }
        list
    }

    /// Execute one action behind a failure boundary.
    ///
    /// `key` is the action's `previous_results` key; nested lists derive
    /// their keys from it.
    pub fn execute_action<'a>(
        &'a self,
        action: &'a ActionConfig,
        ctx: &'a mut ExecutionContext,
        key: &'a str,
    ) -> BoxFuture<'a, ActionOutcome> {
        Box::pin(async move {
            let action_type = action.action_type();
            let started = Instant::now();
            let result = self.dispatch(&action.kind, ctx, key).await;
            let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
            match result {
                Ok(value) => {
                    tracing::debug!(%key, action = %action_type, duration_ms, "action succeeded");
                    ActionOutcome::succeeded(action_type, value, duration_ms)
                }
                Err(err) => {
                    let message = err.to_chain_string();
                    tracing::warn!(%key, action = %action_type, error = %message, "action failed");
                    ActionOutcome::failed(action_type, message, duration_ms)
                }
            }
        })
    }

    async fn dispatch(
        &self,
        kind: &ActionKind,
        ctx: &mut ExecutionContext,
        key: &str,
    ) -> Result<Value, ActionError> {
        match kind {
            ActionKind::AgentExecute { input, agent_id } => {
                self.run_agent(input, agent_id.as_deref(), ctx).await
            }
            ActionKind::ApiCall(http) => self.call_http(http, HttpMethod::Get, None, ctx).await,
            ActionKind::Webhook(http) => {
                let envelope = webhook_envelope(ctx);
                self.call_http(http, HttpMethod::Post, Some(envelope), ctx)
                    .await
            }
            ActionKind::DeviceControl {
                device_id,
                command,
                params,
            } => {
                let scope = ctx.scope();
                let data = json!({
                    "deviceId": interpolate(device_id, &scope),
                    "command": interpolate(command, &scope),
                    "params": interpolate_value(params, &scope),
                });
                Ok(self.emit(EventType::DeviceControl, data, ctx).await)
            }
            ActionKind::SendNotification {
                title,
                message,
                level,
            } => {
                let scope = ctx.scope();
                let data = json!({
                    "title": interpolate(title, &scope),
                    "message": interpolate(message, &scope),
                    "level": level.as_deref().unwrap_or("info"),
                });
                Ok(self.emit(EventType::NotificationRequested, data, ctx).await)
            }
            ActionKind::SendEmail { to, subject, body } => {
                let scope = ctx.scope();
                let data = json!({
                    "to": interpolate(to, &scope),
                    "subject": interpolate(subject, &scope),
                    "body": interpolate(body, &scope),
                });
                Ok(self.emit(EventType::EmailRequested, data, ctx).await)
            }
            ActionKind::SendMessage {
                channel,
                recipient,
                text,
            } => {
                let scope = ctx.scope();
                let data = json!({
                    "channel": channel,
                    "recipient": interpolate(recipient, &scope),
                    "text": interpolate(text, &scope),
                });
                Ok(self.emit(EventType::MessageRequested, data, ctx).await)
            }
            ActionKind::Delay { delay_ms } => {
                tokio::time::sleep(Duration::from_millis(*delay_ms)).await;
                Ok(json!({"delayed": delay_ms}))
            }
            ActionKind::Condition {
                conditions,
                then_actions,
                else_actions,
            } => {
                let met = evaluate_group(conditions, &ctx.scope());
                let (branch, label) = if met {
                    (then_actions, "then")
                } else {
                    (else_actions, "else")
                };
                let list = self
                    .run_ordered_actions(branch, ctx, &format!("{key}_{label}"))
                    .await;
                if let Some((key, message)) = &list.halted {
                    return Err(ActionError::Nested {
                        key: key.clone(),
                        message: message.clone(),
                    });
                }
                Ok(json!({
                    "conditionMet": met,
                    "actionsExecuted": list.outcomes.len(),
                    "results": list.results(),
                }))
            }
            ActionKind::Loop {
                iterations,
                iterate_over,
                loop_actions,
            } => {
                self.run_loop(*iterations, iterate_over.as_deref(), loop_actions, ctx, key)
                    .await
            }
            ActionKind::Script { script, assign_to } => {
                let value = evaluate_script(script, ctx)?;
                if let Some(name) = assign_to {
                    ctx.variables.insert(name.clone(), value.clone());
                }
                Ok(value)
            }
        }
    }

    async fn run_agent(
        &self,
        input: &str,
        agent_id: Option<&str>,
        ctx: &ExecutionContext,
    ) -> Result<Value, ActionError> {
        let request = AgentRequest {
            input: interpolate(input, &ctx.scope()),
            agent_id: agent_id.map(ToString::to_string),
            user_id: ctx.user_id.clone(),
            context: json!({
                "metadata": ctx.metadata(),
                "variables": ctx.variables,
            }),
        };
        self.agent.run(request).await.map_err(ActionError::Agent)
    }

    async fn call_http(
        &self,
        http: &HttpActionConfig,
        default_method: HttpMethod,
        envelope: Option<Map<String, Value>>,
        ctx: &ExecutionContext,
    ) -> Result<Value, ActionError> {
        let scope = ctx.scope();
        let method = http.method.unwrap_or(default_method);
        let url = interpolate(&http.url, &scope);
        let headers = http
            .headers
            .iter()
            .map(|(name, value)| (name.clone(), interpolate(value, &scope)))
            .collect();
        let body = http.body.as_ref().map(|body| interpolate_value(body, &scope));
        let body = match envelope {
            Some(envelope) => Some(merge_envelope(body, envelope)),
            None => body,
        };

        let request = HttpRequest {
            method,
            url: url.clone(),
            headers,
            body,
            timeout: self.http_timeout,
        };
        let response = tokio::time::timeout(self.http_timeout, self.http.send(request))
            .await
            .map_err(|_| ActionError::Timeout {
                url: url.clone(),
                timeout: self.http_timeout,
            })?
            .map_err(ActionError::Request)?;

        if !response.is_success() {
            return Err(ActionError::Status {
                method,
                url,
                status: response.status,
            });
        }
        Ok(json!({
            "request": {"method": method.as_str(), "url": url},
            "status": response.status,
            "data": response.body,
        }))
    }

    async fn run_loop(
        &self,
        iterations: Option<u32>,
        iterate_over: Option<&str>,
        loop_actions: &[ActionConfig],
        ctx: &mut ExecutionContext,
        key: &str,
    ) -> Result<Value, ActionError> {
        // Only an `iterate_over` array is materialized; counted loops yield their index.
        let (items, count) = match (iterate_over, iterations) {
            (Some(path), _) => match lookup(path, &ctx.scope()) {
                Some(Value::Array(items)) => {
                    let count = items.len();
                    (Some(items.clone()), count)
                }
                _ => return Err(ActionError::NotIterable(path.to_string())),
            },
            (None, Some(count)) => (None, usize::try_from(count).unwrap_or(usize::MAX)),
            (None, None) => return Err(ActionError::NoIterations),
        };
        if count > MAX_LOOP_ITERATIONS {
            return Err(ActionError::TooManyIterations {
                count,
                limit: MAX_LOOP_ITERATIONS,
            });
        }

        let saved_item = ctx.variables.remove("item");
        let saved_index = ctx.variables.remove("index");
        let mut results = Vec::with_capacity(count);
        let mut failure = None;
        for index in 0..count {
            let item = items
                .as_ref()
                .map_or_else(|| Value::from(index), |items| items[index].clone());
            ctx.variables.insert("item".to_string(), item);
            ctx.variables.insert("index".to_string(), Value::from(index));
            let list = self
                .run_ordered_actions(loop_actions, ctx, &format!("{key}_loop_{index}"))
                .await;
            results.push(json!({"index": index, "results": list.results()}));
            if let Some((key, message)) = list.halted {
                failure = Some(ActionError::Nested { key, message });
                break;
            }
        }
        restore(ctx, "item", saved_item);
        restore(ctx, "index", saved_index);

        match failure {
            Some(err) => Err(err),
            None => Ok(json!({"iterations": results.len(), "results": results})),
        }
    }

    /// Publish an effect event and acknowledge without waiting for delivery.
    async fn emit(&self, event_type: EventType, mut data: Value, ctx: &ExecutionContext) -> Value {
        if let Value::Object(map) = &mut data {
            map.insert("userId".to_string(), Value::from(ctx.user_id.clone()));
            map.insert(
                "definitionId".to_string(),
                Value::from(ctx.definition_id.clone()),
            );
        }
        let name = event_type.name().to_string();
        if let Err(err) = self
            .publisher
            .publish(Event::new(event_type, data.clone()))
            .await
        {
            tracing::warn!(
                err = %err.to_chain_string(),
                event = %name,
                "failed to publish effect event"
            );
        }
        json!({"queued": true, "event": name, "payload": data})
    }
}

fn restore(ctx: &mut ExecutionContext, name: &str, saved: Option<Value>) {
    match saved {
        Some(value) => {
            ctx.variables.insert(name.to_string(), value);
        }
        None => {
            ctx.variables.remove(name);
        }
    }
}

/// Run metadata merged into every `WEBHOOK` body.
fn webhook_envelope(ctx: &ExecutionContext) -> Map<String, Value> {
    let mut envelope = Map::new();
    envelope.insert("definitionId".to_string(), Value::from(ctx.definition_id.clone()));
    envelope.insert("triggeredBy".to_string(), Value::from(ctx.triggered_by.clone()));
    envelope.insert("variables".to_string(), Value::Object(ctx.variables.clone()));
    envelope.insert(
        "previousResults".to_string(),
        Value::Object(ctx.previous_results.clone()),
    );
    envelope.insert("timestamp".to_string(), Value::from(now().to_rfc3339()));
    envelope
}

/// Object bodies absorb the envelope; any other body is kept under `payload`.
fn merge_envelope(body: Option<Value>, mut envelope: Map<String, Value>) -> Value {
    match body {
        Some(Value::Object(mut map)) => {
            map.append(&mut envelope);
            Value::Object(map)
        }
        None | Some(Value::Null) => Value::Object(envelope),
        Some(other) => {
            envelope.insert("payload".to_string(), other);
            Value::Object(envelope)
        }
    }
}
