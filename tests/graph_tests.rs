//! End-to-end scenarios for the Task Graph (diamond dependency, version
//! conflicts, cycle rejection, cleanup, capability scoring).

mod common;

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use taskgraph::domain::models::{CapabilityProfile, GraphEvent, NewTask, TaskStatus};

fn new_task(title: &str) -> NewTask {
    NewTask { title: title.to_string(), max_retries: 3, timeout_ms: 60_000, ..Default::default() }
}

#[tokio::test]
async fn diamond_dependency_unblocks_in_order() {
    let graph = common::new_graph().await;

    let events: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    graph.subscribe(Arc::new(move |event: &GraphEvent| {
        sink.lock().unwrap().push(format!("{}:{}", event.kind(), event.task_id()));
    }));

    let a = graph.create_task(new_task("A")).await.unwrap();
    let b = graph.create_task(NewTask { depends_on: HashSet::from([a.id]), ..new_task("B") }).await.unwrap();
    let c = graph.create_task(NewTask { depends_on: HashSet::from([a.id]), ..new_task("C") }).await.unwrap();
    let d = graph
        .create_task(NewTask { depends_on: HashSet::from([b.id, c.id]), ..new_task("D") })
        .await
        .unwrap();

    assert_eq!(a.status, TaskStatus::Pending);
    assert_eq!(b.status, TaskStatus::Blocked);
    assert_eq!(c.status, TaskStatus::Blocked);
    assert_eq!(d.status, TaskStatus::Blocked);

    assert!(graph.assign_task(a.id, "agent-1", a.version).await.unwrap());
    let a = graph.get_task(a.id).await.unwrap().unwrap();
    assert!(graph.start_task(a.id, a.version).await.unwrap());
    let a = graph.get_task(a.id).await.unwrap().unwrap();
    let outcome = graph.complete_task(a.id, a.version).await.unwrap();
    assert!(outcome.success);

    let mut unblocked_ids: Vec<_> = outcome.unblocked_tasks.iter().map(|t| t.id).collect();
    unblocked_ids.sort();
    let mut expected = vec![b.id, c.id];
    expected.sort();
    assert_eq!(unblocked_ids, expected);

    let d = graph.get_task(d.id).await.unwrap().unwrap();
    assert_eq!(d.status, TaskStatus::Blocked);

    let b = graph.get_task(b.id).await.unwrap().unwrap();
    assert!(graph.assign_task(b.id, "agent-1", b.version).await.unwrap());
    let b = graph.get_task(b.id).await.unwrap().unwrap();
    assert!(graph.start_task(b.id, b.version).await.unwrap());
    let b = graph.get_task(b.id).await.unwrap().unwrap();
    let outcome = graph.complete_task(b.id, b.version).await.unwrap();
    assert!(outcome.unblocked_tasks.is_empty());

    let d = graph.get_task(d.id).await.unwrap().unwrap();
    assert_eq!(d.status, TaskStatus::Blocked);

    let c = graph.get_task(c.id).await.unwrap().unwrap();
    assert!(graph.assign_task(c.id, "agent-1", c.version).await.unwrap());
    let c = graph.get_task(c.id).await.unwrap().unwrap();
    assert!(graph.start_task(c.id, c.version).await.unwrap());
    let c = graph.get_task(c.id).await.unwrap().unwrap();
    let outcome = graph.complete_task(c.id, c.version).await.unwrap();
    assert_eq!(outcome.unblocked_tasks.len(), 1);
    assert_eq!(outcome.unblocked_tasks[0].id, d.id);

    let d = graph.get_task(d.id).await.unwrap().unwrap();
    assert_eq!(d.status, TaskStatus::Pending);

    let kinds = events.lock().unwrap().clone();
    assert!(kinds.iter().any(|e| e.starts_with(&format!("task_completed:{}", a.id))));
    assert!(kinds.iter().any(|e| e.starts_with(&format!("task_unblocked:{}", b.id))));
    assert!(kinds.iter().any(|e| e.starts_with(&format!("task_unblocked:{}", c.id))));
    assert!(kinds.iter().any(|e| e.starts_with(&format!("task_unblocked:{}", d.id))));
}

#[tokio::test]
async fn version_conflict_exactly_one_winner() {
    let graph = common::new_graph().await;
    let task = graph.create_task(new_task("T")).await.unwrap();

    let first = graph.assign_task(task.id, "agent-x", task.version).await.unwrap();
    let second = graph.assign_task(task.id, "agent-y", task.version).await.unwrap();

    assert!(first != second);
    assert!(first || second);

    let final_task = graph.get_task(task.id).await.unwrap().unwrap();
    assert_eq!(final_task.version, task.version + 1);
    let winner = if first { "agent-x" } else { "agent-y" };
    assert_eq!(final_task.owner_agent_id.as_deref(), Some(winner));
}

#[tokio::test]
async fn cycle_rejection_leaves_edges_and_version_unchanged() {
    let graph = common::new_graph().await;
    let a = graph.create_task(new_task("A")).await.unwrap();
    let b = graph.create_task(NewTask { depends_on: HashSet::from([a.id]), ..new_task("B") }).await.unwrap();
    let c = graph.create_task(NewTask { depends_on: HashSet::from([b.id]), ..new_task("C") }).await.unwrap();

    let a_before = graph.get_task(a.id).await.unwrap().unwrap();
    let result = graph.add_dependencies(a.id, &[c.id]).await;
    assert!(result.is_err());

    let a_after = graph.get_task(a.id).await.unwrap().unwrap();
    assert_eq!(a_after.version, a_before.version);
    assert!(a_after.depends_on.is_empty());
}

#[tokio::test]
async fn cleanup_for_agent_reverts_owned_tasks() {
    let graph = common::new_graph().await;
    let t1 = graph.create_task(new_task("T1")).await.unwrap();
    let t2 = graph.create_task(new_task("T2")).await.unwrap();

    graph.assign_task(t1.id, "agent-1", t1.version).await.unwrap();
    let t1 = graph.get_task(t1.id).await.unwrap().unwrap();
    graph.start_task(t1.id, t1.version).await.unwrap();

    graph.assign_task(t2.id, "agent-1", t2.version).await.unwrap();

    let reverted = graph.cleanup_for_agent("agent-1").await.unwrap();
    assert_eq!(reverted, 2);

    for id in [t1.id, t2.id] {
        let task = graph.get_task(id).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
        assert!(task.owner_agent_id.is_none());
    }
}

#[tokio::test]
async fn retry_refuses_when_budget_exhausted() {
    let graph = common::new_graph().await;
    let task = graph.create_task(NewTask { max_retries: 1, ..new_task("T") }).await.unwrap();

    graph.assign_task(task.id, "agent-1", task.version).await.unwrap();
    let task = graph.get_task(task.id).await.unwrap().unwrap();
    graph.start_task(task.id, task.version).await.unwrap();
    let task = graph.get_task(task.id).await.unwrap().unwrap();
    let outcome = graph.fail_task(task.id, task.version, "boom").await.unwrap();
    assert!(!outcome.can_retry);

    let task = graph.get_task(task.id).await.unwrap().unwrap();
    assert_eq!(task.retry_count, 1);
    assert!(!graph.retry_task(task.id, task.version, Some("agent-2")).await.unwrap());
}

#[tokio::test]
async fn score_agent_boundary_values() {
    let graph = common::new_graph().await;
    let task = graph
        .create_task(NewTask { required_capabilities: HashSet::from(["testing".to_string()]), ..new_task("T") })
        .await
        .unwrap();

    let unknown_score = graph.score_agent("ghost", &task).await.unwrap();
    assert!((unknown_score - 0.1).abs() < f64::EPSILON);

    let mut profile = CapabilityProfile::new("agent-empty-caps");
    profile.capabilities.insert("other".to_string(), 0.9);
    graph.upsert_capability_profile(&profile).await.unwrap();
    let no_match_score = graph.score_agent("agent-empty-caps", &task).await.unwrap();
    assert!((no_match_score - 0.05).abs() < f64::EPSILON);

    let task_no_caps = graph.create_task(new_task("NoCaps")).await.unwrap();
    let fresh_profile = CapabilityProfile::new("agent-fresh");
    graph.upsert_capability_profile(&fresh_profile).await.unwrap();
    let fresh_score = graph.score_agent("agent-fresh", &task_no_caps).await.unwrap();
    assert!((fresh_score - 0.5).abs() < f64::EPSILON);
}

#[tokio::test]
async fn capability_profile_round_trips() {
    let graph = common::new_graph().await;
    let mut profile = CapabilityProfile::new("agent-1");
    profile.record_outcome(&HashSet::from(["testing".to_string()]), true);
    graph.upsert_capability_profile(&profile).await.unwrap();

    let loaded = graph.get_capability_profile("agent-1").await.unwrap().unwrap();
    assert_eq!(loaded.agent_id, profile.agent_id);
    assert_eq!(loaded.total_completed, 1);
    assert_eq!(loaded.capabilities, profile.capabilities);
    assert_eq!(loaded.success_rate, profile.success_rate);
}
