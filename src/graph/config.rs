//! Task Graph tunables.

#[derive(Debug, Clone, Copy)]
pub struct GraphConfig {
    /// Active (non-completed, non-cancelled) task count must stay at or below this.
    pub max_tasks: u32,
    /// A task's `dependsOn` count must stay at or below this.
    pub max_dependencies: u32,
    /// Ceiling on a task's `maxRetries`.
    pub max_retries_ceiling: u32,
    /// Ceiling on a task's `timeoutMs`.
    pub max_timeout_ms: u64,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            max_tasks: 10_000,
            max_dependencies: 100,
            max_retries_ceiling: 10,
            max_timeout_ms: 3_600_000,
        }
    }
}
