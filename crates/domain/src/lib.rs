//! # flowhub-domain
//!
//! Pure domain model for the flowhub rule engine.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps
//! - Define **Automations** (trigger → condition group → ordered action tree)
//! - Define the recursive **action language** and the restricted **script** AST
//! - Define **Execution** records (context, per-action outcomes, results)
//! - Define **Workflows** (node graphs) and their structural validation
//! - Define **Schedules** (recurring cron / one-shot) and the cron grammar
//! - Define **Events** carried by the in-process bus
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod automation;
pub mod event;
pub mod execution;
pub mod schedule;
pub mod workflow;
