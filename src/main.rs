//! # coregraph CLI
//!
//! Runs a compression against an in-memory store persisted as a JSON
//! snapshot between invocations, so an interrupted `run` resumes on the next
//! one.
//!
//! ```bash
//! # First run: seed the state file from a graph snapshot
//! coregraph --config squash.toml --graph graph.json run
//!
//! # Ctrl-C during a run, then pick up where it stopped
//! coregraph --config squash.toml run
//!
//! coregraph --config squash.toml edges --format cypher > core.cypher
//! coregraph --config squash.toml nodes --unfiltered
//! coregraph --config squash.toml reset
//! ```
//!
//! Logging: `RUST_LOG` (default `coregraph=info`), `COREGRAPH_LOG_FORMAT=json`
//! for machine-readable output.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use coregraph::export::export_core_graph_cypher;
use coregraph::{
    Agglomerator, CompressionConfig, Error, GraphSnapshot, MemoryStore, MetaRelator, Result, Squash,
};

// ============================================================================
// CLI structure
// ============================================================================

/// Compress a property graph into a scored core graph.
#[derive(Parser, Debug)]
#[command(name = "coregraph")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Run configuration (TOML)
    #[arg(short, long, global = true, default_value = "coregraph.toml")]
    config: PathBuf,

    /// Store snapshot, read before and written after every command
    #[arg(short, long, global = true, default_value = "coregraph-state.json")]
    state: PathBuf,

    /// Initial graph snapshot, used when the state file does not exist yet
    #[arg(short, long, global = true)]
    graph: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Agglomerate (or resume) and build the meta-relations
    Run {
        /// Override the first hop distance
        #[arg(long)]
        min_hops: Option<u32>,

        /// Override the last hop distance
        #[arg(long)]
        max_hops: Option<u32>,
    },

    /// Print the meta-relations
    Edges {
        /// Skip the cutoff filter
        #[arg(short, long)]
        unfiltered: bool,

        #[arg(short, long, value_enum, default_value_t = EdgeFormat::Json)]
        format: EdgeFormat,
    },

    /// Print the cores with their represented node counts
    Nodes {
        /// Every core, not just those passing the cutoff
        #[arg(short, long)]
        unfiltered: bool,
    },

    /// Delete meta-relations, represents edges and progress
    Reset,

    /// Show the traversal pattern and completed hops
    Describe,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum EdgeFormat {
    Json,
    Cypher,
}

// ============================================================================
// Entry point
// ============================================================================

#[tokio::main]
async fn main() {
    let log_format = std::env::var("COREGRAPH_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "coregraph=info".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    let cli = Cli::parse();
    if let Err(e) = execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn execute(cli: Cli) -> Result<()> {
    let config = CompressionConfig::load(&cli.config)?;
    let store = Arc::new(load_store(&cli.state, cli.graph.as_deref())?);

    match cli.command {
        Commands::Run { min_hops, max_hops } => {
            let mut squash = Squash::new(store.clone(), &config).await?;
            let handle = squash.interrupt_handle();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("Interrupt received, stopping before the next core query");
                    handle.trigger();
                }
            });

            let outcome = squash.squash_graph(min_hops, max_hops).await;
            // Partial progress is what the next run resumes from.
            save_store(&store, &cli.state)?;
            print_json(&outcome?)?;
        }
        Commands::Edges { unfiltered, format } => {
            let mut meta = MetaRelator::new(store, &config);
            let edges = meta.get_core_edge_list(unfiltered).await?;
            match format {
                EdgeFormat::Json => print_json(&edges)?,
                EdgeFormat::Cypher => {
                    let nodes = meta.get_core_node_list(unfiltered).await?;
                    let stdout = std::io::stdout();
                    let mut out = stdout.lock();
                    export_core_graph_cypher(&nodes, &edges, &config.graph.core_label, meta.meta_label(), &mut out)?;
                    out.flush()?;
                }
            }
        }
        Commands::Nodes { unfiltered } => {
            let mut meta = MetaRelator::new(store, &config);
            print_json(&meta.get_core_node_list(unfiltered).await?)?;
        }
        Commands::Reset => {
            let mut squash = Squash::new(store.clone(), &config).await?;
            squash.reset().await?;
            save_store(&store, &cli.state)?;
            println!("Reset complete");
        }
        Commands::Describe => {
            let agglomerator = Agglomerator::new(store, &config).await?;
            println!("{}", agglomerator.describe());
            println!("Cores: {}", agglomerator.cores().len());
            println!("Graph size: {}", agglomerator.graph_size());
            println!("Hop range: {}", agglomerator.hop_range());
            println!("Complete hops: {:?}", agglomerator.list_complete_hops().await?);
        }
    }
    Ok(())
}

// ============================================================================
// State file
// ============================================================================

fn load_store(state: &Path, graph: Option<&Path>) -> Result<MemoryStore> {
    let source = if state.exists() {
        state
    } else {
        graph.ok_or_else(|| Error::Config(format!(
            "{} does not exist. Pass --graph to seed it", state.display()
        )))?
    };
    let text = std::fs::read_to_string(source)?;
    let snapshot: GraphSnapshot = serde_json::from_str(&text)?;
    tracing::info!(
        path = %source.display(),
        nodes = snapshot.nodes.len(),
        relationships = snapshot.relationships.len(),
        "Loaded graph"
    );
    MemoryStore::from_snapshot(snapshot)
}

fn save_store(store: &MemoryStore, path: &Path) -> Result<()> {
    let text = serde_json::to_string_pretty(&store.snapshot())?;
    std::fs::write(path, text)?;
    tracing::info!(path = %path.display(), "Saved state");
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
