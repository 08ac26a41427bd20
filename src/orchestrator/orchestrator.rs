//! Plan-Execute-Observe controller wired on top of the task graph.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration};
use uuid::Uuid;

use crate::domain::error::DomainResult;
use crate::domain::models::{Agent, GraphEvent, NewTask, ResultStatus, Task, TaskFilter, TaskMessage, TaskMessageType, TaskResult, TaskStatus};
use crate::domain::ports::{AgentProvider, MessageSender};
use crate::graph::{SubscriptionId, SubtaskSeed, TaskGraph};

use super::config::OrchestratorConfig;
use super::event_log::{EventLog, EventLogEntry};
use super::matcher::{select_best_agent, AssignmentDecision};

const GOAL_LOG_TRUNCATE: usize = 120;

/// One subtask within a [`GoalDecomposition`]. `depends_on_indices`
/// refers to positions within the same `subtasks` list, resolved to
/// real task ids once every subtask is created.
#[derive(Debug, Clone, Default)]
pub struct SubtaskSpec {
    pub title: String,
    pub description: String,
    pub priority: u8,
    pub input: Value,
    pub expected_output: Value,
    pub acceptance_criteria: String,
    pub required_capabilities: HashSet<String>,
    pub depends_on_indices: Vec<usize>,
    pub max_retries: Option<u32>,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone)]
pub struct GoalDecomposition {
    pub goal: String,
    pub subtasks: Vec<SubtaskSpec>,
    pub parent_task_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    pub accepted: bool,
    pub unblocked_tasks: Vec<Task>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    Stopped,
    Running,
}

#[derive(Debug, Clone)]
pub struct CapabilitySummary {
    pub agent_id: String,
    pub top_capabilities: Vec<(String, f64)>,
}

#[derive(Debug, Clone)]
pub struct OrchestratorStatus {
    pub running: bool,
    pub tasks_by_status: HashMap<&'static str, i64>,
    pub recent_events: Vec<EventLogEntry>,
    pub agent_summaries: Vec<CapabilitySummary>,
}

/// Shared state behind the subscription closure — cloned cheaply via `Arc`.
struct Inner {
    graph: Arc<TaskGraph>,
    agents: Arc<dyn AgentProvider>,
    sender: Arc<dyn MessageSender>,
    config: OrchestratorConfig,
    event_log: EventLog,
}

impl Inner {
    /// Fire-and-forget: spawns the actual send so a slow or blocking
    /// `MessageSender` never stalls the assignment cycle that triggered it.
    fn send_assignment(inner: &Arc<Self>, task: &Task, message_type: TaskMessageType, agent_id: &str) {
        let message = TaskMessage {
            task_id: task.id,
            message_type,
            input: task.input.clone(),
            expected_output: task.expected_output.clone(),
            success_criteria: task.acceptance_criteria.clone(),
            timeout_ms: task.timeout_ms,
        };
        let inner = Arc::clone(inner);
        let agent_id = agent_id.to_string();
        let task_id = task.id;
        tokio::spawn(async move {
            if let Err(err) = inner.sender.send_task_message(&agent_id, message).await {
                tracing::warn!(%task_id, %agent_id, %err, "failed to deliver task message");
                inner.event_log.push("message_send_failed", format!("task={task_id} agent={agent_id} error={err}"));
            }
        });
    }

    async fn available_agents(&self) -> Vec<Agent> {
        match self.agents.get_available_agents().await {
            Ok(agents) => agents,
            Err(err) => {
                tracing::warn!(%err, "agent provider failed");
                self.event_log.push("agent_provider_failed", err.to_string());
                Vec::new()
            }
        }
    }

    async fn assignment_cycle(inner: &Arc<Self>) -> DomainResult<Vec<AssignmentDecision>> {
        let filter = TaskFilter {
            status: Some(std::iter::once(TaskStatus::Pending).collect()),
            unowned: true,
            unblocked: true,
            limit: inner.config.max_assignments_per_cycle as u32,
            ..Default::default()
        };
        let candidates = inner.graph.query_tasks(filter).await?;
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let agents = inner.available_agents().await;
        let mut exclude: HashSet<String> = HashSet::new();
        let mut decisions = Vec::new();

        for task in candidates {
            let Some(decision) =
                select_best_agent(&inner.graph, &task, &agents, &exclude, inner.config.min_capability_score).await?
            else {
                continue;
            };

            exclude.insert(decision.agent_id.clone());
            let assigned = inner.graph.assign_task(task.id, &decision.agent_id, task.version).await?;
            if !assigned {
                continue;
            }

            inner.event_log.push(
                "task_assigned",
                format!("task={} agent={} reason={}", task.id, decision.agent_id, decision.reason),
            );
            Self::send_assignment(inner, &task, TaskMessageType::Assignment, &decision.agent_id);
            decisions.push(decision);
        }

        Ok(decisions)
    }

    /// Fast path for a single freshly unblocked task.
    async fn try_assign_task(inner: &Arc<Self>, task_id: Uuid) -> DomainResult<()> {
        let Some(task) = inner.graph.get_task(task_id).await? else { return Ok(()) };
        if task.status != TaskStatus::Pending {
            return Ok(());
        }

        let agents = inner.available_agents().await;
        let exclude = HashSet::new();
        let Some(decision) =
            select_best_agent(&inner.graph, &task, &agents, &exclude, inner.config.min_capability_score).await?
        else {
            return Ok(());
        };

        if inner.graph.assign_task(task.id, &decision.agent_id, task.version).await? {
            inner.event_log.push(
                "task_assigned",
                format!("task={} agent={} reason={}", task.id, decision.agent_id, decision.reason),
            );
            Self::send_assignment(inner, &task, TaskMessageType::Assignment, &decision.agent_id);
        }
        Ok(())
    }

    /// Reassign a recoverable failure to an alternate agent, falling
    /// back to the same owner.
    async fn attempt_recovery(inner: &Arc<Self>, task_id: Uuid) -> DomainResult<()> {
        let Some(task) = inner.graph.get_task(task_id).await? else { return Ok(()) };
        if task.status != TaskStatus::Failed {
            return Ok(());
        }

        let agents = inner.available_agents().await;
        let owner = task.owner_agent_id.clone();
        let alternate = agents
            .iter()
            .find(|a| a.status.is_assignable() && owner.as_deref() != Some(a.id.as_str()));

        if let Some(alt) = alternate {
            if inner.graph.retry_task(task.id, task.version, Some(&alt.id)).await? {
                inner.event_log.push("task_retried", format!("task={} agent={}", task.id, alt.id));
                Self::send_assignment(inner, &task, TaskMessageType::Reassignment, &alt.id);
            }
            return Ok(());
        }

        let retried = inner.graph.retry_task(task.id, task.version, owner.as_deref()).await?;
        if retried {
            if let Some(owner) = &owner {
                inner.event_log.push("task_retried", format!("task={} agent={owner}", task.id));
                Self::send_assignment(inner, &task, TaskMessageType::Reassignment, owner);
            }
        } else {
            inner.event_log.push("task_recovery_exhausted", format!("task={}", task.id));
        }
        Ok(())
    }

    async fn handle_task_event(inner: &Arc<Self>, event: GraphEvent) {
        let result = match &event {
            GraphEvent::TaskUnblocked(task) => Self::try_assign_task(inner, task.id).await,
            GraphEvent::TaskFailed { task, can_retry: true, .. } => Self::attempt_recovery(inner, task.id).await,
            _ => Ok(()),
        };
        if let Err(err) = result {
            tracing::warn!(event = event.kind(), %err, "orchestrator event handler failed");
            inner.event_log.push("event_handler_failed", format!("event={} error={err}", event.kind()));
        }
    }
}

/// Long-running controller: periodic assignment cycle plus a reactive
/// subscription to the graph's change stream.
pub struct Orchestrator {
    inner: Arc<Inner>,
    state: RwLock<RunState>,
    subscription: RwLock<Option<SubscriptionId>>,
    tick_handle: RwLock<Option<JoinHandle<()>>>,
    shutdown_tx: broadcast::Sender<()>,
}

impl Orchestrator {
    pub fn new(
        graph: Arc<TaskGraph>,
        agents: Arc<dyn AgentProvider>,
        sender: Arc<dyn MessageSender>,
        config: OrchestratorConfig,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            inner: Arc::new(Inner { graph, agents, sender, config, event_log: EventLog::new() }),
            state: RwLock::new(RunState::Stopped),
            subscription: RwLock::new(None),
            tick_handle: RwLock::new(None),
            shutdown_tx,
        }
    }

    /// Create every subtask and wire declared dependencies in one
    /// transaction, then trigger an immediate assignment cycle.
    pub async fn decompose_goal(&self, decomposition: GoalDecomposition) -> DomainResult<Vec<Task>> {
        let seeds: Vec<SubtaskSeed> = decomposition
            .subtasks
            .iter()
            .map(|subtask| SubtaskSeed {
                new_task: NewTask {
                    title: subtask.title.clone(),
                    description: subtask.description.clone(),
                    priority: subtask.priority,
                    parent_task_id: decomposition.parent_task_id,
                    input: subtask.input.clone(),
                    expected_output: subtask.expected_output.clone(),
                    acceptance_criteria: subtask.acceptance_criteria.clone(),
                    required_capabilities: subtask.required_capabilities.clone(),
                    depends_on: HashSet::new(),
                    max_retries: subtask.max_retries.unwrap_or(self.inner.config.max_retries),
                    timeout_ms: subtask.timeout_ms,
                },
                depends_on_indices: subtask.depends_on_indices.clone(),
            })
            .collect();

        let tasks = self.inner.graph.create_subtasks(seeds).await?;
        let ids: Vec<Uuid> = tasks.iter().map(|t| t.id).collect();

        let goal_preview: String = decomposition.goal.chars().take(GOAL_LOG_TRUNCATE).collect();
        self.inner.event_log.push("goal_decomposed", format!("goal={goal_preview:?} tasks={ids:?}"));

        if let Err(err) = Inner::assignment_cycle(&self.inner).await {
            tracing::warn!(%err, "assignment cycle after decomposeGoal failed");
        }

        Ok(tasks)
    }

    /// Validate and apply a worker-reported outcome.
    pub async fn submit_result(&self, result: TaskResult) -> DomainResult<SubmitOutcome> {
        let Some(task) = self.inner.graph.get_task(result.task_id).await? else {
            return Ok(SubmitOutcome { accepted: false, unblocked_tasks: Vec::new(), error: Some("task not found".into()) });
        };
        if !matches!(task.status, TaskStatus::Running | TaskStatus::Assigned) {
            return Ok(SubmitOutcome {
                accepted: false,
                unblocked_tasks: Vec::new(),
                error: Some(format!("task is {} , not running or assigned", task.status.as_str())),
            });
        }

        match result.status {
            ResultStatus::Completed => {
                let outcome = self.inner.graph.complete_task(task.id, task.version).await?;
                if !outcome.success {
                    return Ok(SubmitOutcome {
                        accepted: false,
                        unblocked_tasks: Vec::new(),
                        error: Some("version conflict".into()),
                    });
                }
                if let Some(owner) = &task.owner_agent_id {
                    self.inner.graph.record_task_outcome(owner, &task.required_capabilities, true).await?;
                }
                for unblocked in &outcome.unblocked_tasks {
                    if let Err(err) = Inner::try_assign_task(&self.inner, unblocked.id).await {
                        tracing::warn!(task_id = %unblocked.id, %err, "failed to assign newly unblocked task");
                    }
                }
                Ok(SubmitOutcome { accepted: true, unblocked_tasks: outcome.unblocked_tasks, error: None })
            }
            ResultStatus::Failed => {
                let reason = result.error_message.as_deref().unwrap_or("worker reported failure");
                let outcome = self.inner.graph.fail_task(task.id, task.version, reason).await?;
                if !outcome.success {
                    return Ok(SubmitOutcome {
                        accepted: false,
                        unblocked_tasks: Vec::new(),
                        error: Some("version conflict".into()),
                    });
                }
                if let Some(owner) = &task.owner_agent_id {
                    self.inner.graph.record_task_outcome(owner, &task.required_capabilities, false).await?;
                }
                if !outcome.can_retry {
                    for blocked in &outcome.blocked_tasks {
                        if let Some(owner) = &blocked.owner_agent_id {
                            let message = format!("Task {} is permanently blocked: {reason}", blocked.id);
                            if let Err(err) = self.inner.sender.send_notification(owner, &message).await {
                                tracing::warn!(%err, "failed to deliver blocked notification");
                            }
                        }
                    }
                }
                Ok(SubmitOutcome { accepted: true, unblocked_tasks: Vec::new(), error: None })
            }
        }
    }

    pub async fn assignment_cycle(&self) -> DomainResult<Vec<AssignmentDecision>> {
        Inner::assignment_cycle(&self.inner).await
    }

    /// Idempotent: starts the periodic tick and the graph subscription.
    pub async fn start(&self) -> DomainResult<()> {
        let mut state = self.state.write().await;
        if *state == RunState::Running {
            return Ok(());
        }

        let inner = self.inner.clone();
        let subscription = self.inner.graph.subscribe(Arc::new(move |event: &GraphEvent| {
            let inner = inner.clone();
            let event = event.clone();
            tokio::spawn(async move { Inner::handle_task_event(&inner, event).await });
        }));
        *self.subscription.write().await = Some(subscription);

        let inner = self.inner.clone();
        let mut shutdown = self.shutdown_tx.subscribe();
        let poll_interval = Duration::from_millis(self.inner.config.poll_interval_ms);
        let handle = tokio::spawn(async move {
            let mut ticker = interval(poll_interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(err) = Inner::assignment_cycle(&inner).await {
                            tracing::warn!(%err, "periodic assignment cycle failed");
                        }
                    }
                    _ = shutdown.recv() => break,
                }
            }
        });
        *self.tick_handle.write().await = Some(handle);

        *state = RunState::Running;
        Ok(())
    }

    /// Idempotent: stops the ticker and unsubscribes from the graph.
    pub async fn stop(&self) -> DomainResult<()> {
        let mut state = self.state.write().await;
        if *state == RunState::Stopped {
            return Ok(());
        }

        let _ = self.shutdown_tx.send(());
        if let Some(handle) = self.tick_handle.write().await.take() {
            let _ = handle.await;
        }
        if let Some(id) = self.subscription.write().await.take() {
            self.inner.graph.unsubscribe(id);
        }

        *state = RunState::Stopped;
        Ok(())
    }

    pub async fn get_status(&self) -> DomainResult<OrchestratorStatus> {
        let running = *self.state.read().await == RunState::Running;

        let mut tasks_by_status = HashMap::new();
        for status in [
            TaskStatus::Pending,
            TaskStatus::Assigned,
            TaskStatus::Running,
            TaskStatus::Completed,
            TaskStatus::Failed,
            TaskStatus::Blocked,
            TaskStatus::Cancelled,
        ] {
            let filter = TaskFilter { status: Some(std::iter::once(status).collect()), limit: u32::MAX, ..Default::default() };
            let count = self.inner.graph.query_tasks(filter).await?.len() as i64;
            tasks_by_status.insert(status.as_str(), count);
        }

        let mut agent_summaries = Vec::new();
        for profile in self.inner.graph.get_all_capability_profiles().await? {
            let mut by_success: Vec<(String, f64)> =
                profile.success_rate.iter().map(|(tag, rate)| (tag.clone(), *rate)).collect();
            by_success.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
            by_success.truncate(5);
            agent_summaries.push(CapabilitySummary { agent_id: profile.agent_id, top_capabilities: by_success });
        }

        Ok(OrchestratorStatus {
            running,
            tasks_by_status,
            recent_events: self.inner.event_log.tail(50),
            agent_summaries,
        })
    }

    pub fn get_event_log(&self, limit: usize) -> Vec<EventLogEntry> {
        self.inner.event_log.tail(limit)
    }
}
