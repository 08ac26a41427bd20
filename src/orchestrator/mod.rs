//! The Orchestrator: a Plan-Execute-Observe controller driven on top of
//! the task graph.

pub mod config;
pub mod event_log;
pub mod matcher;
pub mod orchestrator;

pub use config::OrchestratorConfig;
pub use event_log::{EventLog, EventLogEntry};
pub use matcher::{select_best_agent, AssignmentDecision};
pub use orchestrator::{CapabilitySummary, GoalDecomposition, Orchestrator, OrchestratorStatus, SubmitOutcome, SubtaskSpec};
