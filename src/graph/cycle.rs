//! Cycle detection for dependency edges.
//!
//! Existing edges form a DAG prior to any proposed insertion. For each
//! newly proposed `task -> dep` edge, BFS forward from `dep` along
//! existing outgoing dependency edges; if `task` is reachable, the
//! edge would close a cycle.

use std::collections::{HashMap, HashSet, VecDeque};

use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::error::DomainResult;

/// Returns `true` if adding an edge `task -> dep` (task depends on dep)
/// for each `dep` in `new_deps` would create a cycle, given the
/// existing edge set in the store.
pub async fn would_create_cycle(pool: &SqlitePool, task: Uuid, new_deps: &[Uuid]) -> DomainResult<bool> {
    let adjacency = load_adjacency(pool).await?;
    for &dep in new_deps {
        if dep == task {
            return Ok(true);
        }
        if reachable(&adjacency, dep, task) {
            return Ok(true);
        }
    }
    Ok(false)
}

async fn load_adjacency(pool: &SqlitePool) -> DomainResult<HashMap<Uuid, Vec<Uuid>>> {
    let rows: Vec<(String, String)> = sqlx::query_as("SELECT task_id, depends_on_id FROM task_dependencies")
        .fetch_all(pool)
        .await?;

    let mut adjacency: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
    for (task_id, depends_on_id) in rows {
        let (Ok(task_id), Ok(depends_on_id)) = (Uuid::parse_str(&task_id), Uuid::parse_str(&depends_on_id)) else {
            continue;
        };
        // Outgoing edge of `task_id` is its own dependency `depends_on_id`
        // (task_id depends on depends_on_id). BFS from the candidate dep
        // walks this same direction: dep's deps, their deps, and so on.
        adjacency.entry(task_id).or_default().push(depends_on_id);
    }
    Ok(adjacency)
}

/// Is `target` reachable from `start` by walking "X is a dependency of Y" edges?
fn reachable(adjacency: &HashMap<Uuid, Vec<Uuid>>, start: Uuid, target: Uuid) -> bool {
    if start == target {
        return true;
    }
    let mut visited = HashSet::new();
    let mut queue = VecDeque::new();
    queue.push_back(start);
    visited.insert(start);

    while let Some(node) = queue.pop_front() {
        if node == target {
            return true;
        }
        if let Some(neighbors) = adjacency.get(&node) {
            for &next in neighbors {
                if visited.insert(next) {
                    queue.push_back(next);
                }
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reachable_direct() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let mut adjacency = HashMap::new();
        adjacency.insert(a, vec![b]);
        assert!(reachable(&adjacency, a, b));
        assert!(!reachable(&adjacency, b, a));
    }

    #[test]
    fn reachable_transitive() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        let mut adjacency = HashMap::new();
        adjacency.insert(a, vec![b]);
        adjacency.insert(b, vec![c]);
        assert!(reachable(&adjacency, a, c));
    }

    #[test]
    fn reachable_self_is_true() {
        let a = Uuid::new_v4();
        let adjacency = HashMap::new();
        assert!(reachable(&adjacency, a, a));
    }
}
