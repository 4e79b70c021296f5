//! # flowhub-app
//!
//! Application layer — rule-engine services and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `AutomationRepository` — load definitions, record runs, append run logs
//!   - `WorkflowRepository` — load workflow graphs, append execution logs
//!   - `AgentRunner` — hand a prompt to the agent collaborator
//!   - `HttpClient` — outbound HTTP for `API_CALL` / `WEBHOOK`
//!   - `EventPublisher` — publish lifecycle and effect events
//! - Provide the **engine services**:
//!   - `AutomationEngine` — route triggers, guard, evaluate, execute, record
//!   - `ActionExecutor` — the recursive action interpreter
//!   - `Scheduler` — cron / one-shot timers feeding the engine
//!   - `WorkflowRuntime` — node-graph walker
//! - Provide **in-process infrastructure** (event bus, caches, guard) that doesn't need IO
//!
//! ## Dependency rule
//! Depends on `flowhub-domain` only (plus `tokio` for channels, timers and tasks).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod automation_engine;
pub mod evaluator;
pub mod event_bus;
pub mod executor;
pub mod guard;
pub mod ports;
pub mod registry;
pub mod resolver;
pub mod scheduler;
pub mod script;
pub mod workflow_runtime;

#[cfg(test)]
mod testing;
