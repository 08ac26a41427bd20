//! Shared fixtures for integration tests: an in-memory graph, and fake
//! implementations of the two external ports.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use taskgraph::domain::error::DomainResult;
use taskgraph::domain::models::{Agent, AgentStatus, TaskMessage};
use taskgraph::domain::ports::{AgentProvider, MessageSender};
use taskgraph::graph::{GraphConfig, TaskGraph};
use taskgraph::store;

#[allow(dead_code)]
pub async fn new_graph() -> TaskGraph {
    let pool = store::open_test_store().await.expect("failed to open in-memory store");
    store::run_migrations(&pool).await.expect("failed to run migrations");
    TaskGraph::new(pool, GraphConfig::default())
}

/// A roster of agents a test can mutate between assignment cycles.
#[allow(dead_code)]
#[derive(Default)]
pub struct FakeAgentProvider {
    agents: Mutex<HashMap<String, Agent>>,
}

#[allow(dead_code)]
impl FakeAgentProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_agent(self, id: impl Into<String>, capabilities: &[&str]) -> Self {
        let agent = Agent {
            id: id.into(),
            status: AgentStatus::Idle,
            capabilities: capabilities.iter().map(|c| c.to_string()).collect::<HashSet<_>>(),
            role: None,
        };
        self.agents.lock().unwrap().insert(agent.id.clone(), agent);
        self
    }

    pub fn set_status(&self, id: &str, status: AgentStatus) {
        if let Some(agent) = self.agents.lock().unwrap().get_mut(id) {
            agent.status = status;
        }
    }
}

#[async_trait]
impl AgentProvider for FakeAgentProvider {
    async fn get_available_agents(&self) -> DomainResult<Vec<Agent>> {
        Ok(self.agents.lock().unwrap().values().cloned().collect())
    }

    async fn get_agent(&self, id: &str) -> DomainResult<Option<Agent>> {
        Ok(self.agents.lock().unwrap().get(id).cloned())
    }
}

/// Records every message sent, for assertions, without delivering anywhere.
#[allow(dead_code)]
#[derive(Default)]
pub struct FakeMessageSender {
    pub sent: Mutex<Vec<(String, TaskMessage)>>,
    pub notifications: Mutex<Vec<(String, String)>>,
}

#[allow(dead_code)]
impl FakeMessageSender {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl MessageSender for FakeMessageSender {
    async fn send_task_message(&self, agent_id: &str, message: TaskMessage) -> DomainResult<()> {
        self.sent.lock().unwrap().push((agent_id.to_string(), message));
        Ok(())
    }

    async fn send_notification(&self, agent_id: &str, message: &str) -> DomainResult<()> {
        self.notifications.lock().unwrap().push((agent_id.to_string(), message.to_string()));
        Ok(())
    }
}
