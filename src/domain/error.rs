//! Domain-level errors for the task graph.
//!
//! Validation failures (§7 of the design) are the only class the graph
//! raises as an error. Guard failures — stale version, disallowed
//! transitions — are represented as `bool`/`Option` returns and never
//! appear here; callers re-read and retry instead of handling an error.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("task not found: {0}")]
    TaskNotFound(Uuid),

    #[error("agent capability profile not found: {0}")]
    ProfileNotFound(String),

    #[error("dependency cycle detected: adding {dep} as a dependency of {task} would close a cycle")]
    DependencyCycle { task: Uuid, dep: Uuid },

    #[error("active task limit reached ({0} tasks)")]
    TaskLimitExceeded(u32),

    #[error("task has too many dependencies (max {0})")]
    TooManyDependencies(u32),

    #[error("maxRetries must be <= {0}")]
    MaxRetriesTooHigh(u32),

    #[error("timeoutMs must be <= {0}")]
    TimeoutTooHigh(u64),

    #[error("self-dependency is not allowed: {0}")]
    SelfDependency(Uuid),

    #[error("priority must be 0-{max} (0 = highest urgency), got {value}")]
    PriorityOutOfRange { value: u8, max: u8 },

    #[error("database error: {0}")]
    Database(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        DomainError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::Serialization(err.to_string())
    }
}
