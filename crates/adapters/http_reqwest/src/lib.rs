//! # flowhub-adapter-http-reqwest
//!
//! Outbound HTTP adapter using [reqwest](https://docs.rs/reqwest).
//!
//! ## Responsibilities
//! - Implement `HttpClient` for `API_CALL` / `WEBHOOK` actions
//! - Implement `AgentRunner` against the agent collaborator's `/chat` endpoint
//! - Decode response bodies as JSON, falling back to plain text
//!
//! ## Dependency rule
//! Depends on `flowhub-app` (for port traits) and `flowhub-domain` (for domain types).
//! The `app` and `domain` crates must never reference this adapter.

pub mod agent;
pub mod client;
pub mod config;
pub mod error;

pub use agent::ReqwestAgent;
pub use client::ReqwestHttpClient;
pub use config::{AgentConfig, HttpConfig};
