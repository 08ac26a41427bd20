//! Task domain model.
//!
//! A task is the unit of work the graph schedules. See below for the
//! full attribute table and mutability rules.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Status of a task in the execution pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Assigned,
    Running,
    Completed,
    Failed,
    Blocked,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Assigned => "assigned",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Blocked => "blocked",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "assigned" => Some(Self::Assigned),
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "blocked" => Some(Self::Blocked),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Unconditionally terminal states. `Failed` is
    /// only terminal once retries are exhausted, which depends on
    /// `retryCount`/`maxRetries` rather than the status alone — see
    /// [`Task::can_retry`].
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Active = counted against the configured task cap: not completed, not cancelled.
    pub fn is_active_for_cap(self) -> bool {
        !matches!(self, Self::Completed | Self::Cancelled)
    }
}

/// A fully materialized task, as read back from the store. `depends_on`
/// always reflects the edge table exactly (it is never the write path).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    /// 0-4, 0 = highest urgency, 4 = lowest.
    pub priority: u8,
    pub owner_agent_id: Option<String>,
    pub parent_task_id: Option<Uuid>,
    pub input: Value,
    pub expected_output: Value,
    pub acceptance_criteria: String,
    pub required_capabilities: HashSet<String>,
    pub depends_on: HashSet<Uuid>,
    pub version: u64,
    pub retry_count: u32,
    pub max_retries: u32,
    pub timeout_ms: u64,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn can_retry(&self) -> bool {
        self.retry_count < self.max_retries
    }
}

/// Caller-supplied fields for `createTask`. Everything else (id,
/// version, timestamps, status) is assigned by the graph.
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub title: String,
    pub description: String,
    /// 0-4, 0 = highest urgency, 4 = lowest. Out-of-range is rejected by `createTask`.
    pub priority: u8,
    pub parent_task_id: Option<Uuid>,
    pub input: Value,
    pub expected_output: Value,
    pub acceptance_criteria: String,
    pub required_capabilities: HashSet<String>,
    pub depends_on: HashSet<Uuid>,
    pub max_retries: u32,
    pub timeout_ms: u64,
}

/// Filter criteria for querying tasks.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub status: Option<HashSet<TaskStatus>>,
    pub owner_agent_id: Option<String>,
    pub parent_task_id: Option<Uuid>,
    pub unowned: bool,
    /// SQL-level predicate: task has no non-completed dependency.
    pub unblocked: bool,
    /// Post-filter applied after the query returns.
    pub required_capability: Option<String>,
    pub limit: u32,
}

impl TaskFilter {
    pub fn with_limit(limit: u32) -> Self {
        Self { limit, ..Default::default() }
    }
}
