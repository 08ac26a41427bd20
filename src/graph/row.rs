//! Mapping between SQLite rows and domain models: JSON-blob columns for
//! structured payloads, RFC3339 text for timestamps.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};
use uuid::Uuid;

use crate::domain::error::{DomainError, DomainResult};
use crate::domain::models::{CapabilityProfile, Task, TaskStatus};

#[derive(Debug, FromRow)]
pub struct TaskRow {
    pub id: String,
    pub title: String,
    pub description: String,
    pub status: String,
    pub priority: i64,
    pub owner_agent_id: Option<String>,
    pub parent_task_id: Option<String>,
    pub input: String,
    pub expected_output: String,
    pub acceptance_criteria: String,
    pub required_capabilities: String,
    pub version: i64,
    pub retry_count: i64,
    pub max_retries: i64,
    pub timeout_ms: i64,
    pub error_message: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub completed_at: Option<String>,
}

impl TaskRow {
    /// Combine this row with its dependency edges into a full [`Task`].
    pub fn into_task(self, depends_on: HashSet<Uuid>) -> DomainResult<Task> {
        Ok(Task {
            id: parse_uuid(&self.id)?,
            title: self.title,
            description: self.description,
            status: TaskStatus::from_str(&self.status)
                .ok_or_else(|| DomainError::Database(format!("unknown task status {}", self.status)))?,
            priority: u8::try_from(self.priority).unwrap_or(4),
            owner_agent_id: self.owner_agent_id,
            parent_task_id: self.parent_task_id.as_deref().map(parse_uuid).transpose()?,
            input: serde_json::from_str::<Value>(&self.input)?,
            expected_output: serde_json::from_str::<Value>(&self.expected_output)?,
            acceptance_criteria: self.acceptance_criteria,
            required_capabilities: serde_json::from_str(&self.required_capabilities)?,
            depends_on,
            version: u64::try_from(self.version).unwrap_or(0),
            retry_count: u32::try_from(self.retry_count).unwrap_or(0),
            max_retries: u32::try_from(self.max_retries).unwrap_or(0),
            timeout_ms: u64::try_from(self.timeout_ms).unwrap_or(0),
            error_message: self.error_message,
            created_at: parse_time(&self.created_at)?,
            updated_at: parse_time(&self.updated_at)?,
            completed_at: self.completed_at.as_deref().map(parse_time).transpose()?,
        })
    }
}

fn parse_uuid(s: &str) -> DomainResult<Uuid> {
    Uuid::parse_str(s).map_err(|e| DomainError::Database(format!("invalid uuid {s}: {e}")))
}

fn parse_time(s: &str) -> DomainResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DomainError::Database(format!("invalid timestamp {s}: {e}")))
}

#[derive(Debug)]
pub struct CapabilityRow {
    pub agent_id: String,
    pub capabilities: String,
    pub success_rate: String,
    pub total_completed: i64,
    pub total_failed: i64,
    pub updated_at: String,
}

impl<'r> FromRow<'r, SqliteRow> for CapabilityRow {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            agent_id: row.try_get("agent_id")?,
            capabilities: row.try_get("capabilities")?,
            success_rate: row.try_get("success_rate")?,
            total_completed: row.try_get("total_completed")?,
            total_failed: row.try_get("total_failed")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl CapabilityRow {
    pub fn into_profile(self) -> DomainResult<CapabilityProfile> {
        Ok(CapabilityProfile {
            agent_id: self.agent_id,
            capabilities: serde_json::from_str(&self.capabilities)?,
            success_rate: serde_json::from_str(&self.success_rate)?,
            total_completed: u32::try_from(self.total_completed).unwrap_or(0),
            total_failed: u32::try_from(self.total_failed).unwrap_or(0),
            updated_at: parse_time(&self.updated_at)?,
        })
    }
}
