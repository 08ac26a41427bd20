//! Task Graph: the durable, versioned, event-emitting domain store
//! of tasks and their dependencies.

pub mod config;
pub mod cycle;
pub mod events;
pub mod row;
pub mod task_graph;

pub use config::GraphConfig;
pub use events::{EventBus, Listener, SubscriptionId};
pub use task_graph::{CompleteOutcome, FailOutcome, SubtaskSeed, TaskGraph};
