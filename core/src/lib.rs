//! Core library for Lumen, a desktop companion that talks to local and hosted
//! language-model backends through one interface.
//!
//! - [`connectors`] maps each backend's discovery and chat protocol onto one
//!   contract, and [`connectors::ConnectorRegistry`] hands them out by id.
//! - [`config`] persists app metadata, per-model parameters and sealed keys.
//! - [`crypto`] seals credentials at rest.
//! - [`normalizer`] strips reasoning markup from chat replies.
//! - [`orchestrator`] is the façade every front end calls; [`api`] wraps it.
//! - [`errors`] and [`logging`] are the shared failure catalogue and event log.

pub mod api;
pub mod config;
pub mod connectors;
pub mod crypto;
pub mod errors;
pub mod format;
pub mod logging;
pub mod normalizer;
pub mod orchestrator;
pub mod providers;

pub use errors::{LumenError, LumenResult};
pub use orchestrator::Orchestrator;
