//! Task graph change-stream event payloads.

use uuid::Uuid;

use super::task::Task;

/// One event per committed transition, delivered synchronously to every
/// active subscriber within the mutator's call stack.
#[derive(Debug, Clone)]
pub enum GraphEvent {
    TaskCreated(Task),
    TaskAssigned(Task),
    TaskStarted(Task),
    TaskCompleted { task: Task, unblocked: Vec<Task> },
    TaskFailed { task: Task, blocked: Vec<Task>, can_retry: bool },
    TaskCancelled(Task),
    TaskRetried(Task),
    TaskBlocked(Task),
    TaskUnblocked(Task),
}

impl GraphEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TaskCreated(_) => "task_created",
            Self::TaskAssigned(_) => "task_assigned",
            Self::TaskStarted(_) => "task_started",
            Self::TaskCompleted { .. } => "task_completed",
            Self::TaskFailed { .. } => "task_failed",
            Self::TaskCancelled(_) => "task_cancelled",
            Self::TaskRetried(_) => "task_retried",
            Self::TaskBlocked(_) => "task_blocked",
            Self::TaskUnblocked(_) => "task_unblocked",
        }
    }

    /// The task this event is principally about, for quick logging/routing.
    pub fn task_id(&self) -> Uuid {
        match self {
            Self::TaskCreated(t)
            | Self::TaskAssigned(t)
            | Self::TaskStarted(t)
            | Self::TaskCancelled(t)
            | Self::TaskRetried(t)
            | Self::TaskBlocked(t)
            | Self::TaskUnblocked(t) => t.id,
            Self::TaskCompleted { task, .. } | Self::TaskFailed { task, .. } => task.id,
        }
    }
}
