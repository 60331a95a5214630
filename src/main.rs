use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde::Deserialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use foreman::allocation::AllocationStrategy;
use foreman::core::catalog::ResourceCatalog;
use foreman::core::AgentRegistry;
use foreman::knowledge::{JsonFileBackend, KnowledgeStore, MemoryBackend};
use foreman::orchestration::{
    build_plan, Coordinator, CoordinatorOptions, SimulatedExecutor, TaskSpec,
};
use foreman::report::{render_cost_hints, render_plan};
use foreman::{Config, Result};

/// Foreman - dependency-aware agent task coordinator
#[derive(Parser, Debug)]
#[command(name = "foreman")]
#[command(version, about, long_about = None)]
#[command(after_help = "ENVIRONMENT:\n    RUST_LOG=debug    Enable debug logging")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate a manifest and print the execution plan
    Plan {
        /// Path to the agent manifest (TOML)
        manifest: PathBuf,
    },

    /// Execute a manifest with the simulated executor
    Run {
        /// Path to the agent manifest (TOML)
        manifest: PathBuf,

        /// Maximum tasks in progress at once (overrides config)
        #[arg(long)]
        concurrency: Option<usize>,

        /// Milliseconds of simulated work per estimated minute
        #[arg(long, default_value_t = 1)]
        speed: u64,

        /// Agent ids whose tasks should fail (for exercising the
        /// failure paths)
        #[arg(long, value_delimiter = ',')]
        fail: Vec<String>,

        /// Keep learned knowledge in memory only
        #[arg(long)]
        ephemeral: bool,
    },

    /// Show what the knowledge store has learned
    Knowledge,
}

/// Manifest shape: a crew of agents plus optional explicit task specs.
/// With no `[[tasks]]` section, one task is derived per agent.
#[derive(Debug, Deserialize)]
struct RunManifest {
    #[serde(default)]
    tasks: Vec<TaskSpec>,
}

fn load_specs(registry: &AgentRegistry, manifest_path: &PathBuf) -> Result<Vec<TaskSpec>> {
    let manifest: RunManifest = toml::from_str(&std::fs::read_to_string(manifest_path)?)?;
    if manifest.tasks.is_empty() {
        Ok(registry.iter().map(TaskSpec::from_agent).collect())
    } else {
        Ok(manifest.tasks)
    }
}

fn open_knowledge(config: &Config, ephemeral: bool) -> Result<KnowledgeStore> {
    if ephemeral {
        return Ok(KnowledgeStore::open(Box::new(MemoryBackend::new())));
    }
    let path = config.knowledge_path()?;
    Ok(KnowledgeStore::open(Box::new(JsonFileBackend::new(path))))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        Command::Plan { manifest } => {
            let registry = AgentRegistry::load(&manifest)?;
            let specs = load_specs(&registry, &manifest)?;
            let strategy = AllocationStrategy::new(ResourceCatalog::builtin());
            let mut knowledge = open_knowledge(&config, false)?;

            let (tasks, plan) = build_plan(&registry, &strategy, &mut knowledge, &specs)?;
            let dag = foreman::core::TaskDag::from_tasks(tasks)?;
            print!("{}", render_plan(&plan, &dag));

            let hints = render_cost_hints(&plan, &dag, &registry, &strategy);
            if !hints.is_empty() {
                println!();
                print!("{hints}");
            }
        }

        Command::Run {
            manifest,
            concurrency,
            speed,
            fail,
            ephemeral,
        } => {
            let registry = AgentRegistry::load(&manifest)?;
            let specs = load_specs(&registry, &manifest)?;
            let strategy = AllocationStrategy::new(ResourceCatalog::builtin());
            let mut knowledge = open_knowledge(&config, ephemeral)?;

            let (tasks, plan) = build_plan(&registry, &strategy, &mut knowledge, &specs)?;
            info!(
                tasks = tasks.len(),
                estimated_minutes = plan.estimated_duration,
                estimated_cost = plan.estimated_cost,
                "plan built"
            );

            let failing: Vec<&str> = fail.iter().map(String::as_str).collect();
            let executor = Arc::new(SimulatedExecutor::new(speed).with_failing(&failing));
            let options = CoordinatorOptions {
                max_concurrent: concurrency.unwrap_or(config.max_concurrent),
                max_rounds: config.max_rounds,
                round_timeout: Duration::from_secs(30),
            };

            let (mut coordinator, mut finished_rx, _events) =
                Coordinator::new(tasks, plan, registry, knowledge, executor, options)?;
            let outcome = coordinator.run(&mut finished_rx).await;
            print!("{}", outcome.report);

            if !outcome.success {
                std::process::exit(1);
            }
        }

        Command::Knowledge => {
            let knowledge = open_knowledge(&config, false)?;
            let summary = knowledge.summarize();
            println!("Knowledge records: {}", summary.record_count);
            println!("Agent profiles:    {}", summary.profile_count);
            if summary.degraded {
                println!("Persistence:       degraded (in-memory only)");
            }
            for record in &summary.top_records {
                println!(
                    "  [{}/{}/{}] {} - {:.0}% success over {} uses",
                    record.category,
                    record.complexity,
                    record.priority,
                    record.strategy.resource,
                    record.success_rate * 100.0,
                    record.usage_count,
                );
            }
        }
    }

    Ok(())
}
