use std::path::PathBuf;
use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use quill_core::config::AppConfig;
use quill_core::event::{EventBus, GraphEvent};
use quill_core::traits::Searcher;
use quill_core::types::ThreadId;

use quill_agent::{
    canvas_graph, deletion_review, open_checkpointer, CanvasDeps, ExecutionResult, GraphExecutor,
    RunStatus,
};
use quill_tools::{HttpFetcher, TavilySearcher};

#[derive(Parser)]
#[command(name = "quill", version, about = "Research canvas agent with checkpointed runs")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "quill.toml")]
    config: PathBuf,

    /// Print graph lifecycle events to stderr
    #[arg(long, global = true)]
    events: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a message to a thread and run the graph
    Run {
        /// Thread ID (a new one is generated if omitted)
        #[arg(short, long)]
        thread: Option<String>,
        /// The message to send
        #[arg(trailing_var_arg = true, required = true)]
        message: Vec<String>,
    },
    /// Confirm pending deletions, or finish a run that stopped early
    Resume {
        #[arg(short, long)]
        thread: String,
        /// Keep this resource (repeatable)
        #[arg(long)]
        keep: Vec<String>,
        /// Keep every resource; delete nothing
        #[arg(long, conflicts_with = "keep")]
        keep_all: bool,
    },
    /// Print a thread's checkpointed state as JSON
    Show {
        #[arg(short, long)]
        thread: String,
    },
    /// Delete a thread's checkpoint
    Forget {
        #[arg(short, long)]
        thread: String,
    },
    /// Show current configuration
    Config,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("quill=info,warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_path = cli.config;
    let load_config = || -> anyhow::Result<AppConfig> {
        let config = AppConfig::load(&config_path)?;
        info!(config = %config_path.display(), model = %config.model.model_id, "Loaded config");
        Ok(config)
    };

    match cli.command {
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "quill", &mut std::io::stdout());
        }
        Commands::Config => {
            let config = load_config()?;
            println!("{}", toml::to_string_pretty(&config)?);
        }
        Commands::Show { thread } => {
            let store = open_checkpointer(&load_config()?)?;
            match store.load(&ThreadId::from_str(&thread))? {
                Some(cp) => {
                    eprintln!(
                        "[thread {} at step {}, saved {}{}]",
                        thread,
                        cp.step,
                        cp.timestamp.to_rfc3339(),
                        if cp.cursor.suspended { ", suspended" } else { "" }
                    );
                    println!("{}", serde_json::to_string_pretty(&cp.state)?);
                }
                None => eprintln!("No checkpoint for thread {}", thread),
            }
        }
        Commands::Forget { thread } => {
            let store = open_checkpointer(&load_config()?)?;
            if store.delete(&ThreadId::from_str(&thread))? {
                println!("Forgot thread {}", thread);
            } else {
                println!("No checkpoint for thread {}", thread);
            }
        }
        Commands::Run { thread, message } => {
            let thread_id = thread.map(|t| ThreadId::from_str(&t)).unwrap_or_default();
            let graph = build_graph(&load_config()?, cli.events)?;
            let logs_before = graph
                .snapshot(&thread_id)?
                .map_or(0, |cp| cp.state.logs.len());
            eprintln!("[thread {}]", thread_id);
            let result = graph.run(&thread_id, &message.join(" ")).await?;
            report(&thread_id, &result, logs_before);
        }
        Commands::Resume {
            thread,
            keep,
            keep_all,
        } => {
            let thread_id = ThreadId::from_str(&thread);
            let graph = build_graph(&load_config()?, cli.events)?;
            let (pending, logs_before) = graph
                .snapshot(&thread_id)?
                .map(|cp| (cp.state.pending_deletions, cp.state.logs.len()))
                .unwrap_or_default();
            let patch = deletion_review(&pending, &keep, keep_all);
            let result = graph.resume(&thread_id, patch).await?;
            report(&thread_id, &result, logs_before);
        }
    }

    Ok(())
}

fn build_graph(config: &AppConfig, print_events: bool) -> anyhow::Result<GraphExecutor> {
    let event_bus = Arc::new(EventBus::default());
    if print_events {
        spawn_event_printer(&event_bus);
    }

    let searcher = config
        .search
        .as_ref()
        .map(|s| Arc::new(TavilySearcher::new(s)) as Arc<dyn Searcher>);
    if searcher.is_none() {
        info!("No [search] config; search requests are logged only");
    }

    let deps = CanvasDeps {
        llm: quill_llm::client_from_config(config)?,
        model: config.model.clone(),
        fetcher: Arc::new(HttpFetcher::new(&config.fetch)?),
        searcher,
        operator_prompt: config.agent.system_prompt.clone(),
    };
    let graph = canvas_graph(
        deps,
        open_checkpointer(config)?,
        event_bus,
        config.agent.max_steps,
    )?;
    Ok(graph)
}

fn spawn_event_printer(event_bus: &EventBus) {
    let mut rx = event_bus.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = rx.recv().await {
            match event {
                GraphEvent::RunStarted { thread_id } => eprintln!("[run {}]", thread_id),
                GraphEvent::Resumed { node, .. } => eprintln!("[resume at {}]", node),
                GraphEvent::NodeStarted { node, step, .. } => eprintln!("[{} #{}]", node, step),
                GraphEvent::NodeCompleted {
                    node, elapsed_ms, ..
                } => eprintln!("[{}: ok in {}ms]", node, elapsed_ms),
                GraphEvent::CheckpointSaved { step, .. } => eprintln!("[checkpoint {}]", step),
                GraphEvent::Suspended { after, next, .. } => {
                    eprintln!("[suspended after {}, next {}]", after, next)
                }
                GraphEvent::Completed { steps, .. } => eprintln!("[complete: {} steps]", steps),
                GraphEvent::Failed { node, error, .. } => {
                    eprintln!("[{}: ERROR] {}", node, error)
                }
            }
        }
    });
}

fn report(thread_id: &ThreadId, result: &ExecutionResult, logs_before: usize) {
    if let Some(reply) = result.state.messages.iter().rev().find(|m| m.is_assistant()) {
        let text = reply.text();
        if !text.is_empty() {
            println!("{}", text);
        }
    }

    for entry in result.state.logs.iter().skip(logs_before) {
        eprintln!("  {} {}", if entry.done { "✓" } else { "·" }, entry.message);
    }

    match &result.status {
        RunStatus::Completed => eprintln!(
            "\n[done: {} steps in {}ms]",
            result.node_results.len(),
            result.total_elapsed_ms
        ),
        RunStatus::Suspended { after, .. } => {
            eprintln!("\n[suspended after {}] Pending deletions:", after);
            for url in &result.state.pending_deletions {
                let title = result
                    .state
                    .resource(url)
                    .map(|r| r.title.as_str())
                    .unwrap_or("(not in resource list)");
                eprintln!("  - {}  {}", url, title);
            }
            eprintln!(
                "Confirm with: quill resume --thread {}  (add --keep <url> or --keep-all to cancel)",
                thread_id
            );
        }
    }
}
