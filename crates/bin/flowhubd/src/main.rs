//! # flowhubd — flowhub daemon
//!
//! Composition root that wires the adapters into the rule engine.
//!
//! ## Responsibilities
//! - Parse configuration (config file, env vars)
//! - Load the definition store from its JSON seed
//! - Construct the outbound adapters (HTTP client, agent client)
//! - Construct the engine services, injecting adapters via port traits
//! - Arm the scheduler and start the trigger listener
//! - Handle graceful shutdown (SIGINT)
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no domain logic belongs here.

mod config;

use std::sync::Arc;

use flowhub_adapter_http_reqwest::{ReqwestAgent, ReqwestHttpClient};
use flowhub_adapter_storage_memory::Config as StorageConfig;
use flowhub_app::automation_engine::AutomationEngine;
use flowhub_app::event_bus::InProcessEventBus;
use flowhub_app::executor::ActionExecutor;
use flowhub_app::registry::DefinitionRegistry;
use flowhub_app::scheduler::Scheduler;
use flowhub_app::workflow_runtime::WorkflowRuntime;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.logging.filter)?)
        .init();

    // Storage
    let store = StorageConfig {
        seed_path: config.storage.seed_path.clone(),
    }
    .build()?;

    // Outbound adapters
    let bus = Arc::new(InProcessEventBus::new(config.engine.event_bus_capacity));
    let http = ReqwestHttpClient::new(&config.http)?;
    let agent = ReqwestAgent::from_config(config.agent.clone())?;
    let executor = Arc::new(
        ActionExecutor::new(agent, http, Arc::clone(&bus)).with_http_timeout(config.http_timeout()),
    );

    // Engine
    let (triggers, trigger_rx) = mpsc::unbounded_channel();
    let scheduler = Arc::new(Scheduler::new(triggers));
    let engine = Arc::new(
        AutomationEngine::new(
            store.automations(),
            Arc::new(DefinitionRegistry::new()),
            Arc::clone(&executor),
        )
        .with_scheduler(Arc::clone(&scheduler)),
    );
    let loaded = engine.reload_all().await?;
    let armed = scheduler.list().len();
    let listener = Arc::clone(&engine).spawn_listener(bus.subscribe(), trigger_rx);

    // Workflows
    let workflows = Arc::new(
        WorkflowRuntime::new(store.workflows(), executor)
            .with_retention(config.workflow_retention()),
    );
    let graphs = workflows.load_active().await?;

    tracing::info!(
        automations = loaded,
        scheduled = armed,
        workflows = graphs,
        "flowhubd running"
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    scheduler.shutdown();
    listener.abort();

    Ok(())
}
