//! Domain model types shared across the store, graph, and orchestrator layers.

mod agent;
mod capability;
mod event;
mod message;
mod task;

pub use agent::{Agent, AgentStatus};
pub use capability::{CapabilityProfile, SUCCESS_RATE_ALPHA, UNSEEN_TAG_PRIOR};
pub use event::GraphEvent;
pub use message::{Confidence, ResultStatus, TaskMessage, TaskMessageType, TaskResult};
pub use task::{NewTask, Task, TaskFilter, TaskStatus};
