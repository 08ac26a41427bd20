//! Property coverage for the DAG invariant: no sequence of
//! successful dependency insertions can ever close a cycle.

use std::collections::HashSet;

use proptest::prelude::*;
use taskgraph::domain::models::NewTask;

mod common;

/// A permutation of "attempt to add edge (i -> j)" instructions, where
/// edges that would close a cycle are expected to be refused and
/// edges that wouldn't are expected to succeed.
fn edge_attempts_strategy() -> impl Strategy<Value = Vec<(usize, usize)>> {
    prop::collection::vec((0usize..6, 0usize..6), 1..30)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(20))]

    #[test]
    fn dag_invariant_holds_under_random_edge_attempts(attempts in edge_attempts_strategy()) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async move {
            let graph = common::new_graph().await;

            let mut ids = Vec::new();
            for i in 0..6 {
                let task = graph
                    .create_task(NewTask { title: format!("n{i}"), max_retries: 3, timeout_ms: 60_000, ..Default::default() })
                    .await
                    .unwrap();
                ids.push(task.id);
            }

            // Accepted edges, tracked independently to confirm the graph
            // never accepts one that would close a cycle against this set.
            let mut accepted: Vec<(usize, usize)> = Vec::new();

            for (from, to) in attempts {
                if from == to {
                    let result = graph.add_dependencies(ids[from], &[ids[to]]).await;
                    prop_assert!(result.is_err());
                    continue;
                }

                let would_cycle = closes_cycle(&accepted, from, to);
                let result = graph.add_dependencies(ids[from], &[ids[to]]).await;

                if would_cycle {
                    prop_assert!(result.is_err());
                } else if result.is_ok() {
                    accepted.push((from, to));
                }
            }

            Ok(())
        })?;
    }
}

/// Would adding edge `from -> to` (from depends on to) close a cycle,
/// given the edges already accepted?
fn closes_cycle(edges: &[(usize, usize)], from: usize, to: usize) -> bool {
    // from -> to closes a cycle iff `from` is already reachable from `to`.
    let mut visited = HashSet::new();
    let mut stack = vec![to];
    while let Some(node) = stack.pop() {
        if node == from {
            return true;
        }
        if !visited.insert(node) {
            continue;
        }
        for &(a, b) in edges {
            if a == node {
                stack.push(b);
            }
        }
    }
    false
}
