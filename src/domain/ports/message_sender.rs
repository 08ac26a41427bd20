//! Message sender port. The transport carrying bytes to an
//! agent is external; the Orchestrator only requires fire-and-forget
//! send operations.

use async_trait::async_trait;

use crate::domain::error::DomainResult;
use crate::domain::models::TaskMessage;

#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send_task_message(&self, agent_id: &str, message: TaskMessage) -> DomainResult<()>;

    async fn send_notification(&self, agent_id: &str, message: &str) -> DomainResult<()>;
}
