//! The Task Graph: the domain layer over the durable store.
//!
//! Owns state machine transitions, dependency semantics, cycle
//! detection, optimistic locking, capability statistics, and the
//! change-stream. Every mutating method either fully commits or fully
//! rolls back; guard failures (stale version, disallowed transition)
//! return `false`/`None` rather than raising an error.

use std::collections::HashSet;

use chrono::Utc;
use sqlx::{Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

use crate::domain::error::{DomainError, DomainResult};
use crate::domain::models::{CapabilityProfile, GraphEvent, NewTask, Task, TaskFilter, TaskStatus};

use super::config::GraphConfig;
use super::cycle::would_create_cycle;
use super::events::{EventBus, Listener, SubscriptionId};
use super::row::{CapabilityRow, TaskRow};

/// Highest (lowest-urgency) priority value a task may carry (0 = most urgent).
const MAX_PRIORITY: u8 = 4;

/// One subtask in a [`TaskGraph::create_subtasks`] batch. `depends_on_indices`
/// refers to other entries in the same batch by position.
#[derive(Debug, Clone)]
pub struct SubtaskSeed {
    pub new_task: NewTask,
    pub depends_on_indices: Vec<usize>,
}

/// Result of [`TaskGraph::complete_task`].
#[derive(Debug, Clone)]
pub struct CompleteOutcome {
    pub success: bool,
    pub unblocked_tasks: Vec<Task>,
}

/// Result of [`TaskGraph::fail_task`].
#[derive(Debug, Clone)]
pub struct FailOutcome {
    pub success: bool,
    pub blocked_tasks: Vec<Task>,
    pub can_retry: bool,
}

pub struct TaskGraph {
    pool: SqlitePool,
    config: GraphConfig,
    events: EventBus,
}

impl TaskGraph {
    pub fn new(pool: SqlitePool, config: GraphConfig) -> Self {
        Self { pool, config, events: EventBus::new() }
    }

    pub fn subscribe(&self, listener: Listener) -> SubscriptionId {
        self.events.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.events.unsubscribe(id);
    }

    // ---- creation -----------------------------------------------------

    pub async fn create_task(&self, new: NewTask) -> DomainResult<Task> {
        if new.priority > MAX_PRIORITY {
            return Err(DomainError::PriorityOutOfRange { value: new.priority, max: MAX_PRIORITY });
        }
        if new.max_retries > self.config.max_retries_ceiling {
            return Err(DomainError::MaxRetriesTooHigh(self.config.max_retries_ceiling));
        }
        if new.timeout_ms > self.config.max_timeout_ms {
            return Err(DomainError::TimeoutTooHigh(self.config.max_timeout_ms));
        }
        if new.depends_on.len() as u32 > self.config.max_dependencies {
            return Err(DomainError::TooManyDependencies(self.config.max_dependencies));
        }

        let active_count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM tasks WHERE status NOT IN ('completed', 'cancelled')")
                .fetch_one(&self.pool)
                .await?;
        if active_count.0 as u32 >= self.config.max_tasks {
            return Err(DomainError::TaskLimitExceeded(self.config.max_tasks));
        }

        let id = Uuid::new_v4();
        let deps: Vec<Uuid> = new.depends_on.iter().copied().collect();
        if would_create_cycle(&self.pool, id, &deps).await? {
            return Err(DomainError::DependencyCycle {
                task: id,
                dep: deps.into_iter().next().unwrap_or(id),
            });
        }

        let mut tx = self.pool.begin().await?;

        let mut incomplete_dep_found = false;
        for dep in &deps {
            let row: Option<(String,)> = sqlx::query_as("SELECT status FROM tasks WHERE id = ?")
                .bind(dep.to_string())
                .fetch_optional(&mut *tx)
                .await?;
            match row {
                Some((status,)) if status != "completed" => incomplete_dep_found = true,
                Some(_) => {}
                None => return Err(DomainError::TaskNotFound(*dep)),
            }
        }
        let initial_status = if incomplete_dep_found { TaskStatus::Blocked } else { TaskStatus::Pending };

        let now = Utc::now();
        sqlx::query(
            r#"INSERT INTO tasks
               (id, title, description, status, priority, owner_agent_id, parent_task_id,
                input, expected_output, acceptance_criteria, required_capabilities,
                version, retry_count, max_retries, timeout_ms, error_message,
                created_at, updated_at, completed_at)
               VALUES (?, ?, ?, ?, ?, NULL, ?, ?, ?, ?, ?, 1, 0, ?, ?, NULL, ?, ?, NULL)"#,
        )
        .bind(id.to_string())
        .bind(&new.title)
        .bind(&new.description)
        .bind(initial_status.as_str())
        .bind(i64::from(new.priority))
        .bind(new.parent_task_id.map(|p| p.to_string()))
        .bind(serde_json::to_string(&new.input)?)
        .bind(serde_json::to_string(&new.expected_output)?)
        .bind(&new.acceptance_criteria)
        .bind(serde_json::to_string(&new.required_capabilities)?)
        .bind(i64::from(new.max_retries))
        .bind(new.timeout_ms as i64)
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        for dep in &deps {
            sqlx::query("INSERT OR IGNORE INTO task_dependencies (task_id, depends_on_id) VALUES (?, ?)")
                .bind(id.to_string())
                .bind(dep.to_string())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        let task = self.get_task(id).await?.ok_or(DomainError::TaskNotFound(id))?;
        self.events.emit(&GraphEvent::TaskCreated(task.clone()));
        Ok(task)
    }

    /// Create a batch of subtasks wired to each other by in-batch index, all
    /// in one transaction: either every subtask and edge commits, or none do.
    pub async fn create_subtasks(&self, seeds: Vec<SubtaskSeed>) -> DomainResult<Vec<Task>> {
        let ids: Vec<Uuid> = (0..seeds.len()).map(|_| Uuid::new_v4()).collect();

        for (i, seed) in seeds.iter().enumerate() {
            if seed.new_task.priority > MAX_PRIORITY {
                return Err(DomainError::PriorityOutOfRange { value: seed.new_task.priority, max: MAX_PRIORITY });
            }
            if seed.new_task.max_retries > self.config.max_retries_ceiling {
                return Err(DomainError::MaxRetriesTooHigh(self.config.max_retries_ceiling));
            }
            if seed.new_task.timeout_ms > self.config.max_timeout_ms {
                return Err(DomainError::TimeoutTooHigh(self.config.max_timeout_ms));
            }
            let dep_count = seed.new_task.depends_on.len() + seed.depends_on_indices.len();
            if dep_count as u32 > self.config.max_dependencies {
                return Err(DomainError::TooManyDependencies(self.config.max_dependencies));
            }
            for &dep_idx in &seed.depends_on_indices {
                if dep_idx == i {
                    return Err(DomainError::SelfDependency(ids[i]));
                }
                if dep_idx >= seeds.len() {
                    return Err(DomainError::TaskNotFound(ids[i]));
                }
            }
        }

        if let Some((task, dep)) = index_graph_cycle(&seeds, &ids) {
            return Err(DomainError::DependencyCycle { task, dep });
        }

        let active_count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM tasks WHERE status NOT IN ('completed', 'cancelled')")
                .fetch_one(&self.pool)
                .await?;
        if active_count.0 as u32 + seeds.len() as u32 > self.config.max_tasks {
            return Err(DomainError::TaskLimitExceeded(self.config.max_tasks));
        }

        let mut tx = self.pool.begin().await?;

        let now = Utc::now();
        for (i, seed) in seeds.iter().enumerate() {
            let mut incomplete_dep_found = !seed.depends_on_indices.is_empty();
            for dep in &seed.new_task.depends_on {
                let row: Option<(String,)> = sqlx::query_as("SELECT status FROM tasks WHERE id = ?")
                    .bind(dep.to_string())
                    .fetch_optional(&mut *tx)
                    .await?;
                match row {
                    Some((status,)) if status != "completed" => incomplete_dep_found = true,
                    Some(_) => {}
                    None => return Err(DomainError::TaskNotFound(*dep)),
                }
            }
            let initial_status = if incomplete_dep_found { TaskStatus::Blocked } else { TaskStatus::Pending };
            let new = &seed.new_task;

            sqlx::query(
                r#"INSERT INTO tasks
                   (id, title, description, status, priority, owner_agent_id, parent_task_id,
                    input, expected_output, acceptance_criteria, required_capabilities,
                    version, retry_count, max_retries, timeout_ms, error_message,
                    created_at, updated_at, completed_at)
                   VALUES (?, ?, ?, ?, ?, NULL, ?, ?, ?, ?, ?, 1, 0, ?, ?, NULL, ?, ?, NULL)"#,
            )
            .bind(ids[i].to_string())
            .bind(&new.title)
            .bind(&new.description)
            .bind(initial_status.as_str())
            .bind(i64::from(new.priority))
            .bind(new.parent_task_id.map(|p| p.to_string()))
            .bind(serde_json::to_string(&new.input)?)
            .bind(serde_json::to_string(&new.expected_output)?)
            .bind(&new.acceptance_criteria)
            .bind(serde_json::to_string(&new.required_capabilities)?)
            .bind(i64::from(new.max_retries))
            .bind(new.timeout_ms as i64)
            .bind(now.to_rfc3339())
            .bind(now.to_rfc3339())
            .execute(&mut *tx)
            .await?;
        }

        for (i, seed) in seeds.iter().enumerate() {
            for dep in &seed.new_task.depends_on {
                sqlx::query("INSERT OR IGNORE INTO task_dependencies (task_id, depends_on_id) VALUES (?, ?)")
                    .bind(ids[i].to_string())
                    .bind(dep.to_string())
                    .execute(&mut *tx)
                    .await?;
            }
            for &dep_idx in &seed.depends_on_indices {
                sqlx::query("INSERT OR IGNORE INTO task_dependencies (task_id, depends_on_id) VALUES (?, ?)")
                    .bind(ids[i].to_string())
                    .bind(ids[dep_idx].to_string())
                    .execute(&mut *tx)
                    .await?;
            }
        }

        tx.commit().await?;

        let mut tasks = Vec::with_capacity(ids.len());
        for id in &ids {
            let task = self.get_task(*id).await?.ok_or(DomainError::TaskNotFound(*id))?;
            self.events.emit(&GraphEvent::TaskCreated(task.clone()));
            tasks.push(task);
        }
        Ok(tasks)
    }

    // ---- reads ----------------------------------------------------------

    pub async fn get_task(&self, id: Uuid) -> DomainResult<Option<Task>> {
        let row: Option<TaskRow> = sqlx::query_as("SELECT * FROM tasks WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => {
                let deps = self.load_dependencies(id).await?;
                Ok(Some(row.into_task(deps)?))
            }
            None => Ok(None),
        }
    }

    async fn load_dependencies(&self, task_id: Uuid) -> DomainResult<HashSet<Uuid>> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT depends_on_id FROM task_dependencies WHERE task_id = ?")
            .bind(task_id.to_string())
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().filter_map(|(id,)| Uuid::parse_str(&id).ok()).collect())
    }

    pub async fn query_tasks(&self, filter: TaskFilter) -> DomainResult<Vec<Task>> {
        let mut sql = String::from("SELECT t.* FROM tasks t WHERE 1=1");
        let mut bindings: Vec<String> = Vec::new();

        if let Some(statuses) = &filter.status {
            let placeholders = vec!["?"; statuses.len()].join(", ");
            sql.push_str(&format!(" AND t.status IN ({placeholders})"));
            for s in statuses {
                bindings.push(s.as_str().to_string());
            }
        }
        if let Some(owner) = &filter.owner_agent_id {
            sql.push_str(" AND t.owner_agent_id = ?");
            bindings.push(owner.clone());
        }
        if filter.unowned {
            sql.push_str(" AND t.owner_agent_id IS NULL");
        }
        if let Some(parent) = filter.parent_task_id {
            sql.push_str(" AND t.parent_task_id = ?");
            bindings.push(parent.to_string());
        }
        if filter.unblocked {
            sql.push_str(
                " AND NOT EXISTS (SELECT 1 FROM task_dependencies d \
                   JOIN tasks dep ON dep.id = d.depends_on_id \
                   WHERE d.task_id = t.id AND dep.status != 'completed')",
            );
        }
        sql.push_str(" ORDER BY t.priority ASC, t.created_at ASC");

        let limit = if filter.limit == 0 { 100 } else { filter.limit };
        sql.push_str(&format!(" LIMIT {limit}"));

        let mut query = sqlx::query_as::<_, TaskRow>(&sql);
        for b in &bindings {
            query = query.bind(b);
        }
        let rows = query.fetch_all(&self.pool).await?;

        let mut tasks = Vec::with_capacity(rows.len());
        for row in rows {
            let id = Uuid::parse_str(&row.id).map_err(|e| DomainError::Database(e.to_string()))?;
            let deps = self.load_dependencies(id).await?;
            tasks.push(row.into_task(deps)?);
        }

        if let Some(cap) = &filter.required_capability {
            tasks.retain(|t| t.required_capabilities.contains(cap));
        }

        Ok(tasks)
    }

    /// Best candidate for the given agent capabilities.
    pub async fn get_next_task(&self, agent_caps: Option<&HashSet<String>>) -> DomainResult<Option<Task>> {
        let filter = TaskFilter {
            status: Some(std::iter::once(TaskStatus::Pending).collect()),
            unblocked: true,
            unowned: true,
            limit: 100,
            ..Default::default()
        };
        let candidates = self.query_tasks(filter).await?;
        if candidates.is_empty() {
            return Ok(None);
        }

        if let Some(caps) = agent_caps {
            if let Some(matched) =
                candidates.iter().find(|t| !t.required_capabilities.is_empty() && !t.required_capabilities.is_disjoint(caps))
            {
                return Ok(Some(matched.clone()));
            }
        }

        Ok(candidates.into_iter().next())
    }

    // ---- state machine --------------------------------------------------

    pub async fn assign_task(&self, task_id: Uuid, agent_id: &str, expected_version: u64) -> DomainResult<bool> {
        let now = Utc::now().to_rfc3339();
        let result = sqlx::query(
            "UPDATE tasks SET owner_agent_id = ?, status = 'assigned', version = version + 1, updated_at = ? \
             WHERE id = ? AND version = ? AND status IN ('pending', 'failed')",
        )
        .bind(agent_id)
        .bind(&now)
        .bind(task_id.to_string())
        .bind(expected_version as i64)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(false);
        }
        let task = self.get_task(task_id).await?.ok_or(DomainError::TaskNotFound(task_id))?;
        self.events.emit(&GraphEvent::TaskAssigned(task));
        Ok(true)
    }

    pub async fn start_task(&self, task_id: Uuid, expected_version: u64) -> DomainResult<bool> {
        let now = Utc::now().to_rfc3339();
        let result = sqlx::query(
            "UPDATE tasks SET status = 'running', version = version + 1, updated_at = ? \
             WHERE id = ? AND version = ? AND status = 'assigned'",
        )
        .bind(&now)
        .bind(task_id.to_string())
        .bind(expected_version as i64)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(false);
        }
        let task = self.get_task(task_id).await?.ok_or(DomainError::TaskNotFound(task_id))?;
        self.events.emit(&GraphEvent::TaskStarted(task));
        Ok(true)
    }

    pub async fn complete_task(&self, task_id: Uuid, expected_version: u64) -> DomainResult<CompleteOutcome> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now().to_rfc3339();
        let result = sqlx::query(
            "UPDATE tasks SET status = 'completed', error_message = NULL, completed_at = ?, \
             version = version + 1, updated_at = ? \
             WHERE id = ? AND version = ? AND status IN ('assigned', 'running')",
        )
        .bind(&now)
        .bind(&now)
        .bind(task_id.to_string())
        .bind(expected_version as i64)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(CompleteOutcome { success: false, unblocked_tasks: Vec::new() });
        }

        let unblocked = self.unblock_dependents(&mut tx, task_id).await?;
        tx.commit().await?;

        let task = self.get_task(task_id).await?.ok_or(DomainError::TaskNotFound(task_id))?;
        self.events.emit(&GraphEvent::TaskCompleted { task, unblocked: unblocked.clone() });
        for t in &unblocked {
            self.events.emit(&GraphEvent::TaskUnblocked(t.clone()));
        }

        Ok(CompleteOutcome { success: true, unblocked_tasks: unblocked })
    }

    pub async fn fail_task(
        &self,
        task_id: Uuid,
        expected_version: u64,
        error_message: &str,
    ) -> DomainResult<FailOutcome> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now().to_rfc3339();
        let result = sqlx::query(
            "UPDATE tasks SET status = 'failed', retry_count = retry_count + 1, error_message = ?, \
             version = version + 1, updated_at = ? \
             WHERE id = ? AND version = ? AND status IN ('assigned', 'running')",
        )
        .bind(error_message)
        .bind(&now)
        .bind(task_id.to_string())
        .bind(expected_version as i64)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(FailOutcome { success: false, blocked_tasks: Vec::new(), can_retry: false });
        }

        let blocked = self.block_dependents(&mut tx, task_id, error_message).await?;
        tx.commit().await?;

        let task = self.get_task(task_id).await?.ok_or(DomainError::TaskNotFound(task_id))?;
        let can_retry = task.can_retry();
        self.events.emit(&GraphEvent::TaskFailed { task, blocked: blocked.clone(), can_retry });
        for t in &blocked {
            self.events.emit(&GraphEvent::TaskBlocked(t.clone()));
        }

        Ok(FailOutcome { success: true, blocked_tasks: blocked, can_retry })
    }

    pub async fn cancel_task(&self, task_id: Uuid, expected_version: u64) -> DomainResult<bool> {
        let now = Utc::now().to_rfc3339();
        let result = sqlx::query(
            "UPDATE tasks SET status = 'cancelled', owner_agent_id = NULL, version = version + 1, updated_at = ? \
             WHERE id = ? AND version = ? AND status NOT IN ('completed', 'cancelled')",
        )
        .bind(&now)
        .bind(task_id.to_string())
        .bind(expected_version as i64)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(false);
        }
        let task = self.get_task(task_id).await?.ok_or(DomainError::TaskNotFound(task_id))?;
        self.events.emit(&GraphEvent::TaskCancelled(task));
        Ok(true)
    }

    /// The sanctioned `failed -> {assigned, pending}` transition.
    /// `assignTask` also permits this path directly, skipping the
    /// retry-count check, so callers that want the budget enforced
    /// should route retries through here rather than through `assignTask`.
    pub async fn retry_task(
        &self,
        task_id: Uuid,
        expected_version: u64,
        agent_id: Option<&str>,
    ) -> DomainResult<bool> {
        let now = Utc::now().to_rfc3339();
        let new_status = if agent_id.is_some() { "assigned" } else { "pending" };
        let result = sqlx::query(
            "UPDATE tasks SET status = ?, owner_agent_id = ?, error_message = NULL, \
             version = version + 1, updated_at = ? \
             WHERE id = ? AND version = ? AND status = 'failed' AND retry_count < max_retries",
        )
        .bind(new_status)
        .bind(agent_id)
        .bind(&now)
        .bind(task_id.to_string())
        .bind(expected_version as i64)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(false);
        }
        let task = self.get_task(task_id).await?.ok_or(DomainError::TaskNotFound(task_id))?;
        self.events.emit(&GraphEvent::TaskRetried(task));
        Ok(true)
    }

    /// Append dependency edges, refusing a cycle or the per-task
    /// dependency cap.
    pub async fn add_dependencies(&self, task_id: Uuid, dep_ids: &[Uuid]) -> DomainResult<()> {
        if dep_ids.iter().any(|d| *d == task_id) {
            return Err(DomainError::SelfDependency(task_id));
        }

        let existing = self.load_dependencies(task_id).await?;
        let new_deps: Vec<Uuid> = dep_ids.iter().copied().filter(|d| !existing.contains(d)).collect();
        if new_deps.is_empty() {
            return Ok(());
        }
        if (existing.len() + new_deps.len()) as u32 > self.config.max_dependencies {
            return Err(DomainError::TooManyDependencies(self.config.max_dependencies));
        }

        if would_create_cycle(&self.pool, task_id, &new_deps).await? {
            return Err(DomainError::DependencyCycle { task: task_id, dep: new_deps[0] });
        }

        let mut tx = self.pool.begin().await?;

        let mut any_incomplete = false;
        for dep in &new_deps {
            let row: Option<(String,)> = sqlx::query_as("SELECT status FROM tasks WHERE id = ?")
                .bind(dep.to_string())
                .fetch_optional(&mut *tx)
                .await?;
            match row {
                Some((status,)) if status != "completed" => any_incomplete = true,
                Some(_) => {}
                None => return Err(DomainError::TaskNotFound(*dep)),
            }
            sqlx::query("INSERT OR IGNORE INTO task_dependencies (task_id, depends_on_id) VALUES (?, ?)")
                .bind(task_id.to_string())
                .bind(dep.to_string())
                .execute(&mut *tx)
                .await?;
        }

        let mut became_blocked = false;
        if any_incomplete {
            let now = Utc::now().to_rfc3339();
            let result = sqlx::query(
                "UPDATE tasks SET status = 'blocked', version = version + 1, updated_at = ? \
                 WHERE id = ? AND status NOT IN ('completed', 'cancelled', 'blocked')",
            )
            .bind(&now)
            .bind(task_id.to_string())
            .execute(&mut *tx)
            .await?;
            became_blocked = result.rows_affected() > 0;
        }

        tx.commit().await?;

        if became_blocked {
            let task = self.get_task(task_id).await?.ok_or(DomainError::TaskNotFound(task_id))?;
            self.events.emit(&GraphEvent::TaskBlocked(task));
        }
        Ok(())
    }

    // ---- fan-out ----------------------------------------------------------

    /// For every `blocked` task depending on `task_id`, re-check all of
    /// its deps; if all are `completed`, transition to `pending`.
    async fn unblock_dependents(&self, tx: &mut Transaction<'_, Sqlite>, task_id: Uuid) -> DomainResult<Vec<Task>> {
        let dependents: Vec<(String,)> = sqlx::query_as(
            "SELECT t.id FROM tasks t JOIN task_dependencies d ON d.task_id = t.id \
             WHERE d.depends_on_id = ? AND t.status = 'blocked'",
        )
        .bind(task_id.to_string())
        .fetch_all(&mut **tx)
        .await?;

        let mut unblocked = Vec::new();
        for (id_str,) in dependents {
            let dep_id = Uuid::parse_str(&id_str).map_err(|e| DomainError::Database(e.to_string()))?;

            let incomplete: (i64,) = sqlx::query_as(
                "SELECT COUNT(*) FROM task_dependencies d JOIN tasks dep ON dep.id = d.depends_on_id \
                 WHERE d.task_id = ? AND dep.status != 'completed'",
            )
            .bind(dep_id.to_string())
            .fetch_one(&mut **tx)
            .await?;

            if incomplete.0 == 0 {
                let now = Utc::now().to_rfc3339();
                sqlx::query(
                    "UPDATE tasks SET status = 'pending', version = version + 1, updated_at = ? \
                     WHERE id = ? AND status = 'blocked'",
                )
                .bind(&now)
                .bind(dep_id.to_string())
                .execute(&mut **tx)
                .await?;

                let row: TaskRow = sqlx::query_as("SELECT * FROM tasks WHERE id = ?")
                    .bind(dep_id.to_string())
                    .fetch_one(&mut **tx)
                    .await?;
                let deps: Vec<(String,)> = sqlx::query_as("SELECT depends_on_id FROM task_dependencies WHERE task_id = ?")
                    .bind(dep_id.to_string())
                    .fetch_all(&mut **tx)
                    .await?;
                let deps = deps.into_iter().filter_map(|(d,)| Uuid::parse_str(&d).ok()).collect();
                unblocked.push(row.into_task(deps)?);
            }
        }
        Ok(unblocked)
    }

    /// For every non-terminal task depending on `task_id`, transition to
    /// `blocked` with a descriptive reason. Skips `completed`/`cancelled`
    /// dependents, but re-annotates one that is already `blocked` — a second
    /// failing dependency updates the reason and fires another event.
    async fn block_dependents(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        task_id: Uuid,
        reason: &str,
    ) -> DomainResult<Vec<Task>> {
        let dependents: Vec<(String,)> = sqlx::query_as(
            "SELECT t.id FROM tasks t JOIN task_dependencies d ON d.task_id = t.id \
             WHERE d.depends_on_id = ? AND t.status NOT IN ('completed', 'cancelled')",
        )
        .bind(task_id.to_string())
        .fetch_all(&mut **tx)
        .await?;

        let short_id = task_id.to_string().chars().take(8).collect::<String>();
        let error_message = format!("Blocked: dependency {short_id} failed — {reason}");

        let mut blocked = Vec::new();
        for (id_str,) in dependents {
            let dep_id = Uuid::parse_str(&id_str).map_err(|e| DomainError::Database(e.to_string()))?;
            let now = Utc::now().to_rfc3339();
            let result = sqlx::query(
                "UPDATE tasks SET status = 'blocked', error_message = ?, version = version + 1, updated_at = ? \
                 WHERE id = ?",
            )
            .bind(&error_message)
            .bind(&now)
            .bind(dep_id.to_string())
            .execute(&mut **tx)
            .await?;

            if result.rows_affected() > 0 {
                let row: TaskRow = sqlx::query_as("SELECT * FROM tasks WHERE id = ?")
                    .bind(dep_id.to_string())
                    .fetch_one(&mut **tx)
                    .await?;
                let deps: Vec<(String,)> = sqlx::query_as("SELECT depends_on_id FROM task_dependencies WHERE task_id = ?")
                    .bind(dep_id.to_string())
                    .fetch_all(&mut **tx)
                    .await?;
                let deps = deps.into_iter().filter_map(|(d,)| Uuid::parse_str(&d).ok()).collect();
                blocked.push(row.into_task(deps)?);
            }
        }
        Ok(blocked)
    }

    // ---- capability profiles -----------------------------------------------

    pub async fn upsert_capability_profile(&self, profile: &CapabilityProfile) -> DomainResult<()> {
        sqlx::query(
            "INSERT INTO agent_capabilities (agent_id, capabilities, success_rate, total_completed, total_failed, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?) \
             ON CONFLICT(agent_id) DO UPDATE SET capabilities = excluded.capabilities, \
             success_rate = excluded.success_rate, total_completed = excluded.total_completed, \
             total_failed = excluded.total_failed, updated_at = excluded.updated_at",
        )
        .bind(&profile.agent_id)
        .bind(serde_json::to_string(&profile.capabilities)?)
        .bind(serde_json::to_string(&profile.success_rate)?)
        .bind(i64::from(profile.total_completed))
        .bind(i64::from(profile.total_failed))
        .bind(profile.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_capability_profile(&self, agent_id: &str) -> DomainResult<Option<CapabilityProfile>> {
        let row: Option<CapabilityRow> = sqlx::query_as("SELECT * FROM agent_capabilities WHERE agent_id = ?")
            .bind(agent_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(CapabilityRow::into_profile).transpose()
    }

    pub async fn get_all_capability_profiles(&self) -> DomainResult<Vec<CapabilityProfile>> {
        let rows: Vec<CapabilityRow> = sqlx::query_as("SELECT * FROM agent_capabilities").fetch_all(&self.pool).await?;
        rows.into_iter().map(CapabilityRow::into_profile).collect()
    }

    pub async fn record_task_outcome(&self, agent_id: &str, task_caps: &HashSet<String>, succeeded: bool) -> DomainResult<()> {
        let mut profile = self.get_capability_profile(agent_id).await?.unwrap_or_else(|| CapabilityProfile::new(agent_id));
        profile.record_outcome(task_caps, succeeded);
        self.upsert_capability_profile(&profile).await
    }

    /// Capability-weighted fitness of `agent_id` for `task`, in `[0, 1]`
    /// for the given task.
    pub async fn score_agent(&self, agent_id: &str, task: &Task) -> DomainResult<f64> {
        const UNKNOWN_AGENT_SCORE: f64 = 0.1;
        const NO_MATCH_SCORE: f64 = 0.05;
        const CONFIDENCE_WEIGHT: f64 = 0.4;
        const SUCCESS_RATE_WEIGHT: f64 = 0.6;

        let Some(profile) = self.get_capability_profile(agent_id).await? else {
            return Ok(UNKNOWN_AGENT_SCORE);
        };

        if task.required_capabilities.is_empty() {
            return Ok(profile.overall_reliability());
        }

        let matched: Vec<&String> =
            task.required_capabilities.iter().filter(|tag| profile.capabilities.contains_key(*tag)).collect();
        if matched.is_empty() {
            return Ok(NO_MATCH_SCORE);
        }

        let sum: f64 = matched
            .iter()
            .map(|tag| {
                let confidence = profile.capabilities.get(*tag).copied().unwrap_or(0.5);
                let success_rate = profile.success_rate.get(*tag).copied().unwrap_or(0.5);
                CONFIDENCE_WEIGHT * confidence + SUCCESS_RATE_WEIGHT * success_rate
            })
            .sum();
        let mean = sum / matched.len() as f64;
        let coverage = matched.len() as f64 / task.required_capabilities.len() as f64;
        Ok((mean * coverage).clamp(0.0, 1.0))
    }

    // ---- administrative ----------------------------------------------------

    /// Reset `assigned`/`running` tasks owned by `agent_id` back to
    /// `pending` with no owner.
    pub async fn cleanup_for_agent(&self, agent_id: &str) -> DomainResult<u64> {
        let now = Utc::now().to_rfc3339();
        let result = sqlx::query(
            "UPDATE tasks SET status = 'pending', owner_agent_id = NULL, version = version + 1, updated_at = ? \
             WHERE owner_agent_id = ? AND status IN ('assigned', 'running')",
        )
        .bind(&now)
        .bind(agent_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Admin reset: deletes all tasks (edges cascade) and capability
    /// profiles. Returns the task-delete count.
    pub async fn clear_all(&self) -> DomainResult<u64> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("DELETE FROM tasks").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM agent_capabilities").execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(result.rows_affected())
    }
}

/// Does any `depends_on_indices` edge in this batch close a cycle, purely
/// among the batch's own index graph? All batch members are freshly
/// created, so no existing stored edge can participate in a cycle with them.
fn index_graph_cycle(seeds: &[SubtaskSeed], ids: &[Uuid]) -> Option<(Uuid, Uuid)> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Unvisited,
        InProgress,
        Done,
    }

    fn visit(i: usize, seeds: &[SubtaskSeed], marks: &mut [Mark]) -> Option<usize> {
        marks[i] = Mark::InProgress;
        for &dep in &seeds[i].depends_on_indices {
            match marks[dep] {
                Mark::InProgress => return Some(dep),
                Mark::Done => {}
                Mark::Unvisited => {
                    if let Some(culprit) = visit(dep, seeds, marks) {
                        return Some(culprit);
                    }
                }
            }
        }
        marks[i] = Mark::Done;
        None
    }

    let mut marks = vec![Mark::Unvisited; seeds.len()];
    for i in 0..seeds.len() {
        if marks[i] == Mark::Unvisited {
            if let Some(dep) = visit(i, seeds, &mut marks) {
                return Some((ids[i], ids[dep]));
            }
        }
    }
    None
}
