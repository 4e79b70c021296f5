//! # flowhub-adapter-storage-memory
//!
//! In-memory persistence adapter.
//!
//! ## Responsibilities
//! - Implement the repository port traits defined in `flowhub-app::ports`
//! - Load automation and workflow definitions from a JSON seed document
//! - Keep run counters and append-only run / execution logs in memory
//!
//! ## Dependency rule
//! Depends on `flowhub-app` (for port traits) and `flowhub-domain` (for domain types).
//! The `app` and `domain` crates must never reference this adapter.

pub mod automation_repo;
pub mod error;
pub mod seed;
pub mod workflow_repo;

pub use automation_repo::InMemoryAutomationRepository;
pub use seed::{Config, Seed, Store};
pub use workflow_repo::InMemoryWorkflowRepository;
