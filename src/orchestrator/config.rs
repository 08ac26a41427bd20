//! Orchestrator tunables.

#[derive(Debug, Clone, Copy)]
pub struct OrchestratorConfig {
    /// Default per-task retry ceiling applied when decomposing goals.
    pub max_retries: u32,
    /// Interval between assignment-cycle ticks.
    pub poll_interval_ms: u64,
    /// Upper bound on tasks considered per assignment cycle.
    pub max_assignments_per_cycle: usize,
    /// Agents scoring below this are rejected by the matcher.
    pub min_capability_score: f64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            poll_interval_ms: 5_000,
            max_assignments_per_cycle: 5,
            min_capability_score: 0.1,
        }
    }
}
