//! Wire-shaped types exchanged with external collaborators.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// The kind of `TaskMessage` being delivered to an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskMessageType {
    Assignment,
    Reassignment,
    Cancellation,
    BlockedNotification,
    UnblockedNotification,
}

/// Message delivered to an agent by the message sender.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskMessage {
    pub task_id: Uuid,
    #[serde(rename = "type")]
    pub message_type: TaskMessageType,
    pub input: Value,
    pub expected_output: Value,
    pub success_criteria: String,
    pub timeout_ms: u64,
}

/// Outcome status reported by a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    Completed,
    Failed,
}

/// Worker-reported confidence in its own result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

/// A worker-reported task outcome, submitted through result intake.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: Uuid,
    pub status: ResultStatus,
    pub output: Value,
    pub confidence: Confidence,
    pub duration_ms: u64,
    pub error_message: Option<String>,
}
