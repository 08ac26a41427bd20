//! Agent provider port, one of the two external contracts the
//! Orchestrator consumes; implemented by the agent process lifecycle
//! manager, which lives outside this crate.

use async_trait::async_trait;

use crate::domain::error::DomainResult;
use crate::domain::models::Agent;

#[async_trait]
pub trait AgentProvider: Send + Sync {
    /// Snapshot of workers currently assignable.
    async fn get_available_agents(&self) -> DomainResult<Vec<Agent>>;

    async fn get_agent(&self, id: &str) -> DomainResult<Option<Agent>>;
}
