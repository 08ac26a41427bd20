//! Task Graph & Orchestrator: a persistent, transactional store of
//! tasks and dependency edges, and the Plan-Execute-Observe controller
//! that routes ready work to capability-matched agents.

pub mod cli;
pub mod config;
pub mod domain;
pub mod graph;
pub mod logging;
pub mod orchestrator;
pub mod store;

pub use domain::error::{DomainError, DomainResult};
pub use domain::models;
pub use domain::ports::{AgentProvider, MessageSender};
pub use graph::{GraphConfig, TaskGraph};
pub use orchestrator::{Orchestrator, OrchestratorConfig};
