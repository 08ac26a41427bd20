//! The minimal view the core has of an agent, supplied by the external
//! Agent provider port. The core never owns agent lifecycle.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Agent availability as reported by the Agent Provider. Only `Idle`
/// and `Restored` are assignable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Idle,
    Restored,
    Busy,
    Offline,
}

impl AgentStatus {
    pub fn is_assignable(self) -> bool {
        matches!(self, Self::Idle | Self::Restored)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    pub status: AgentStatus,
    pub capabilities: HashSet<String>,
    pub role: Option<String>,
}
