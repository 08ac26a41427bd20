//! Bounded in-memory event log for recent orchestrator activity.
//!
//! Capped at 1 000 entries, oldest dropped first. Never panics into a
//! caller — logging a malformed entry is still a successful log write.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Utc};

const CAPACITY: usize = 1_000;
const MAX_DETAIL_LEN: usize = 500;
const TRUNCATION_SUFFIX: &str = "... [truncated]";

#[derive(Debug, Clone, serde::Serialize)]
pub struct EventLogEntry {
    #[serde(rename = "type")]
    pub kind: String,
    pub timestamp: DateTime<Utc>,
    pub details: String,
}

#[derive(Default)]
pub struct EventLog {
    entries: Mutex<VecDeque<EventLogEntry>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, kind: impl Into<String>, details: impl Into<String>) {
        let mut details = details.into();
        if details.len() > MAX_DETAIL_LEN {
            details.truncate(MAX_DETAIL_LEN);
            details.push_str(TRUNCATION_SUFFIX);
        }
        let entry = EventLogEntry { kind: kind.into(), timestamp: Utc::now(), details };

        let Ok(mut entries) = self.entries.lock() else {
            tracing::error!("event log mutex poisoned; dropping entry");
            return;
        };
        if entries.len() >= CAPACITY {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// Most recent `limit` entries, newest first.
    pub fn tail(&self, limit: usize) -> Vec<EventLogEntry> {
        let Ok(entries) = self.entries.lock() else {
            tracing::error!("event log mutex poisoned; returning empty tail");
            return Vec::new();
        };
        entries.iter().rev().take(limit).cloned().collect()
    }
}
