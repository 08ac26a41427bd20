//! Demonstration-only implementations of the two external ports. A real
//! deployment's agent lifecycle manager and message transport live
//! outside this crate.

use std::collections::HashSet;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::domain::error::DomainResult;
use crate::domain::models::{Agent, AgentStatus, TaskMessage};
use crate::domain::ports::{AgentProvider, MessageSender};

/// A fixed roster of agents, configurable from the CLI for quick trials.
pub struct StaticAgentProvider {
    agents: RwLock<Vec<Agent>>,
}

impl StaticAgentProvider {
    pub fn new(agents: Vec<Agent>) -> Self {
        Self { agents: RwLock::new(agents) }
    }

    pub fn single_idle(id: impl Into<String>, capabilities: HashSet<String>) -> Self {
        Self::new(vec![Agent { id: id.into(), status: AgentStatus::Idle, capabilities, role: None }])
    }
}

#[async_trait]
impl AgentProvider for StaticAgentProvider {
    async fn get_available_agents(&self) -> DomainResult<Vec<Agent>> {
        Ok(self.agents.read().expect("agent roster lock poisoned").clone())
    }

    async fn get_agent(&self, id: &str) -> DomainResult<Option<Agent>> {
        Ok(self.agents.read().expect("agent roster lock poisoned").iter().find(|a| a.id == id).cloned())
    }
}

/// Logs every message to `tracing` instead of delivering it anywhere.
pub struct LoggingMessageSender;

#[async_trait]
impl MessageSender for LoggingMessageSender {
    async fn send_task_message(&self, agent_id: &str, message: TaskMessage) -> DomainResult<()> {
        tracing::info!(agent_id, task_id = %message.task_id, kind = ?message.message_type, "delivering task message");
        Ok(())
    }

    async fn send_notification(&self, agent_id: &str, message: &str) -> DomainResult<()> {
        tracing::info!(agent_id, message, "delivering notification");
        Ok(())
    }
}
