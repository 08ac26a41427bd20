//! Capability-weighted agent matching for assignment decisions.

use std::collections::HashSet;

use crate::domain::error::DomainResult;
use crate::domain::models::{Agent, Task};
use crate::graph::TaskGraph;

/// Outcome of matching a task to an agent, independent of whether the
/// subsequent guarded assignment actually lands.
#[derive(Debug, Clone)]
pub struct AssignmentDecision {
    pub agent_id: String,
    pub score: f64,
    pub reason: String,
}

/// Highest-scoring eligible agent above `min_score`, or a fallback pick
/// with a "Fallback" reason if none clears the threshold but at least
/// one eligible agent exists.
pub async fn select_best_agent(
    graph: &TaskGraph,
    task: &Task,
    agents: &[Agent],
    exclude: &HashSet<String>,
    min_score: f64,
) -> DomainResult<Option<AssignmentDecision>> {
    let eligible: Vec<&Agent> = agents.iter().filter(|a| a.status.is_assignable() && !exclude.contains(&a.id)).collect();
    if eligible.is_empty() {
        return Ok(None);
    }

    let mut best: Option<(&Agent, f64)> = None;
    for agent in &eligible {
        let score = graph.score_agent(&agent.id, task).await?;
        if best.map_or(true, |(_, best_score)| score > best_score) {
            best = Some((agent, score));
        }
    }

    let (agent, score) = best.expect("eligible is non-empty");
    if score > min_score {
        return Ok(Some(AssignmentDecision {
            agent_id: agent.id.clone(),
            score,
            reason: "Capability match".to_string(),
        }));
    }

    let fallback = eligible[0];
    Ok(Some(AssignmentDecision {
        agent_id: fallback.id.clone(),
        score: 0.1,
        reason: "Fallback: no agent exceeded the minimum capability score".to_string(),
    }))
}
