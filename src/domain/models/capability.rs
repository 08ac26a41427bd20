//! Agent capability profile model.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// EMA smoothing factor applied to `success_rate` on every outcome.
pub const SUCCESS_RATE_ALPHA: f64 = 0.3;
/// Prior confidence/success-rate assumed for a tag the profile has never seen.
pub const UNSEEN_TAG_PRIOR: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityProfile {
    pub agent_id: String,
    pub capabilities: HashMap<String, f64>,
    pub success_rate: HashMap<String, f64>,
    pub total_completed: u32,
    pub total_failed: u32,
    pub updated_at: DateTime<Utc>,
}

impl CapabilityProfile {
    pub fn new(agent_id: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            capabilities: HashMap::new(),
            success_rate: HashMap::new(),
            total_completed: 0,
            total_failed: 0,
            updated_at: Utc::now(),
        }
    }

    /// Overall lifetime reliability, defaulting to 0.5 with no history.
    pub fn overall_reliability(&self) -> f64 {
        let total = self.total_completed + self.total_failed;
        if total == 0 {
            UNSEEN_TAG_PRIOR
        } else {
            f64::from(self.total_completed) / f64::from(total)
        }
    }

    /// Record a task outcome for the given required-capability tags,
    /// updating the EMA success rate per tag.
    pub fn record_outcome(&mut self, task_caps: &std::collections::HashSet<String>, succeeded: bool) {
        if succeeded {
            self.total_completed += 1;
        } else {
            self.total_failed += 1;
        }

        let outcome = if succeeded { 1.0 } else { 0.0 };
        for tag in task_caps {
            self.capabilities.entry(tag.clone()).or_insert(UNSEEN_TAG_PRIOR);
            let prev = *self.success_rate.get(tag).unwrap_or(&UNSEEN_TAG_PRIOR);
            let updated = prev * (1.0 - SUCCESS_RATE_ALPHA) + outcome * SUCCESS_RATE_ALPHA;
            self.success_rate.insert(tag.clone(), updated);
        }

        self.updated_at = Utc::now();
    }
}
