//! Thin demonstration harness: wires the Task Graph and Orchestrator to
//! stub agent/message ports and drives a short end-to-end run.

pub mod stub;

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::Deserialize;

use crate::config::AppConfig;
use crate::domain::models::TaskFilter;
use crate::graph::TaskGraph;
use crate::orchestrator::{GoalDecomposition, Orchestrator, SubtaskSpec};
use crate::store;

use self::stub::{LoggingMessageSender, StaticAgentProvider};

#[derive(Parser, Debug)]
#[command(name = "taskgraph", about = "Task Graph & Orchestrator demonstration CLI")]
pub struct Cli {
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Decompose a goal, run one assignment cycle against a single stub
    /// agent, and print the resulting tasks.
    Demo {
        /// JSON file describing the goal and its subtasks; falls back to
        /// a built-in two-task example when omitted.
        #[arg(long)]
        goal_file: Option<PathBuf>,
    },
    /// Print a summary of the tasks currently in the store.
    Status,
}

#[derive(Debug, Deserialize)]
struct GoalFile {
    goal: String,
    subtasks: Vec<GoalFileSubtask>,
}

#[derive(Debug, Deserialize)]
struct GoalFileSubtask {
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default = "default_priority")]
    priority: u8,
    #[serde(default)]
    required_capabilities: HashSet<String>,
    #[serde(default)]
    depends_on_indices: Vec<usize>,
    #[serde(default = "default_timeout_ms")]
    timeout_ms: u64,
}

fn default_priority() -> u8 {
    2
}
fn default_timeout_ms() -> u64 {
    60_000
}

fn builtin_goal() -> GoalFile {
    GoalFile {
        goal: "Ship the onboarding flow".to_string(),
        subtasks: vec![
            GoalFileSubtask {
                title: "Write integration tests".to_string(),
                description: "Cover the signup happy path".to_string(),
                priority: 1,
                required_capabilities: ["testing".to_string()].into_iter().collect(),
                depends_on_indices: Vec::new(),
                timeout_ms: 60_000,
            },
            GoalFileSubtask {
                title: "Review and merge".to_string(),
                description: "Review the onboarding PR".to_string(),
                priority: 2,
                required_capabilities: ["code-review".to_string()].into_iter().collect(),
                depends_on_indices: vec![0],
                timeout_ms: 30_000,
            },
        ],
    }
}

fn into_decomposition(file: GoalFile) -> GoalDecomposition {
    GoalDecomposition {
        goal: file.goal,
        parent_task_id: None,
        subtasks: file
            .subtasks
            .into_iter()
            .map(|s| SubtaskSpec {
                title: s.title,
                description: s.description,
                priority: s.priority,
                input: serde_json::Value::Null,
                expected_output: serde_json::Value::Null,
                acceptance_criteria: String::new(),
                required_capabilities: s.required_capabilities,
                depends_on_indices: s.depends_on_indices,
                max_retries: None,
                timeout_ms: s.timeout_ms,
            })
            .collect(),
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let config_path = cli.config.unwrap_or_else(AppConfig::default_path);
    let config = AppConfig::load(&config_path).unwrap_or_else(|err| {
        eprintln!("warning: using default configuration ({err})");
        AppConfig::default()
    });
    let _ = crate::logging::init(&config.logging);

    let pool = store::open_store(&config.database.path, store::PoolConfig::default()).await?;
    store::run_migrations(&pool).await?;
    let graph = Arc::new(TaskGraph::new(pool, config.graph.clone().into()));

    match cli.command {
        Command::Demo { goal_file } => run_demo(graph, goal_file).await,
        Command::Status => print_status(&graph).await,
    }
}

async fn run_demo(graph: Arc<TaskGraph>, goal_file: Option<PathBuf>) -> anyhow::Result<()> {
    let file = match goal_file {
        Some(path) => {
            let contents = std::fs::read_to_string(&path)?;
            serde_json::from_str(&contents)?
        }
        None => builtin_goal(),
    };

    let mut capabilities = HashSet::new();
    capabilities.insert("testing".to_string());
    capabilities.insert("code-review".to_string());
    let agents = Arc::new(StaticAgentProvider::single_idle("agent-demo", capabilities));
    let sender = Arc::new(LoggingMessageSender);

    let orchestrator = Orchestrator::new(graph.clone(), agents, sender, Default::default());
    orchestrator.start().await?;

    let tasks = orchestrator.decompose_goal(into_decomposition(file)).await?;
    println!("Created {} tasks:", tasks.len());
    for task in &tasks {
        println!("  {} [{}] {}", task.id, task.status.as_str(), task.title);
    }

    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    let status = orchestrator.get_status().await?;
    println!("\nStatus after one cycle:");
    for (status_name, count) in &status.tasks_by_status {
        if *count > 0 {
            println!("  {status_name}: {count}");
        }
    }

    orchestrator.stop().await?;
    Ok(())
}

async fn print_status(graph: &TaskGraph) -> anyhow::Result<()> {
    let tasks = graph.query_tasks(TaskFilter::with_limit(1000)).await?;
    println!("{} tasks in store:", tasks.len());
    for task in tasks {
        println!("  {} [{}] {}", task.id, task.status.as_str(), task.title);
    }
    Ok(())
}
