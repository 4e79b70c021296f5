//! Port definitions — traits that adapters implement.
//!
//! Ports are the boundaries between the application core and the outside world.
//! They are defined here (in `app`) so that both the services and the
//! adapter layer can depend on them without creating circular dependencies.

pub mod agent;
pub mod automation_repo;
pub mod event_bus;
pub mod http;
pub mod workflow_repo;

pub use agent::{AgentRequest, AgentRunner};
pub use automation_repo::AutomationRepository;
pub use event_bus::EventPublisher;
pub use http::{HttpClient, HttpRequest, HttpResponse};
pub use workflow_repo::WorkflowRepository;
