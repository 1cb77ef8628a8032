//! Cross-repository indexing worker.
//!
//! ## Commands
//!
//! - `index <REPO>` - Run one indexing pass and print the outcome as JSON
//! - `run [SEEDS]` - Start the worker pool and index seeds until interrupted
//! - `config` - Print the effective configuration

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use xref_indexer::{
    work_queue, Dispatcher, QueueHandle, ResolverRegistry, Services, WorkQueue, Worker,
    WorkerConfig,
};
use xref_protocol::{Origin, RepoName, RepositoryReference, WorkItem};

mod discovery;
mod internal_api;

use discovery::WebSearchDiscovery;
use internal_api::InternalClient;

#[derive(Parser)]
#[command(name = "xref-indexer", version, about = "Cross-repository indexing worker")]
struct Cli {
    /// TOML configuration file; environment variables override it.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Index one repository and exit
    Index {
        /// Repository name, optionally `name@revision`
        repo: String,

        /// Revision to index; overrides any `@revision` suffix
        #[arg(long)]
        rev: Option<String>,

        /// Index as a dependency discovered from this repository (no spidering)
        #[arg(long, value_name = "REPO")]
        parent: Option<String>,
    },
    /// Start the worker pool and index seeds until interrupted
    Run {
        /// Repositories to index on startup, `name[@revision]`
        seeds: Vec<String>,

        /// Also read seeds from stdin, one per line
        #[arg(long)]
        stdin: bool,
    },
    /// Print the effective configuration as JSON
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let cli = Cli::parse();
    let config = WorkerConfig::load(cli.config.as_deref()).context("failed to load config")?;

    match cli.command {
        Command::Index { repo, rev, parent } => {
            let code = index_once(&config, &repo, rev, parent).await?;
            std::process::exit(code);
        }
        Command::Run { seeds, stdin } => run_pool(&config, &seeds, stdin).await,
        Command::Config => print_config(&config),
    }
}

fn build_worker(config: &WorkerConfig, queue: Arc<dyn WorkQueue>) -> Result<Worker> {
    let client = Arc::new(InternalClient::new(&config.frontend_url)?);
    let discovery = Arc::new(WebSearchDiscovery::new(config.discovery.clone())?);
    let services = Services {
        store: client.clone(),
        lang_servers: client.clone(),
        global_index: client,
        queue,
    };
    if !config.xrepo_index_enabled {
        log::info!("cross-repo indexing disabled, only watermarks and language servers are updated");
    }
    Ok(Worker::new(
        services,
        ResolverRegistry::with_defaults(discovery),
        config,
    ))
}

async fn index_once(
    config: &WorkerConfig,
    repo: &str,
    rev: Option<String>,
    parent: Option<String>,
) -> Result<i32> {
    let mut reference = RepositoryReference::parse(repo)
        .with_context(|| format!("invalid repository {repo:?}"))?;
    if let Some(rev) = rev {
        reference.revision = rev;
    }
    let origin = match parent {
        Some(parent) => Origin::Primary.child(RepoName::from(parent)),
        None => Origin::Primary,
    };

    let (queue, mut receiver) = work_queue(config.queue_capacity);
    let worker = build_worker(config, Arc::new(queue))?;

    match worker.index(&reference, &origin).await {
        Ok(outcome) => {
            let mut queued = Vec::new();
            while let Some(item) = receiver.try_recv() {
                queued.push(item.reference.to_string());
            }
            let payload = json!({
                "repo": reference.to_string(),
                "result": outcome,
                "queued": queued,
            });
            println!("{}", serde_json::to_string_pretty(&payload)?);
            Ok(0)
        }
        Err(err) => {
            log::error!("indexing failed repo={reference} error={err}");
            Ok(1)
        }
    }
}

async fn run_pool(config: &WorkerConfig, seeds: &[String], read_stdin: bool) -> Result<()> {
    let (queue, receiver) = work_queue(config.queue_capacity);
    let worker = build_worker(config, Arc::new(queue.clone()))?;
    let dispatcher = Dispatcher::start(Arc::new(worker), receiver, config);
    log::info!(
        "worker pool started workers={} queue_capacity={}",
        config.workers.max(1),
        config.queue_capacity
    );

    for seed in seeds {
        submit_seed(&queue, seed);
    }
    if read_stdin {
        tokio::spawn(read_seeds(queue.clone()));
    }

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    log::info!("shutting down");

    let health = dispatcher.health_snapshot();
    dispatcher.shutdown().await;
    log::info!("final health {}", serde_json::to_string(&health)?);
    Ok(())
}

fn submit_seed(queue: &QueueHandle, seed: &str) {
    match RepositoryReference::parse(seed) {
        Some(reference) => {
            queue.submit(WorkItem::primary(reference));
        }
        None => log::warn!("ignoring invalid seed {seed:?}"),
    }
}

async fn read_seeds(queue: QueueHandle) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) if line.trim().is_empty() => {}
            Ok(Some(line)) => submit_seed(&queue, &line),
            Ok(None) => break,
            Err(err) => {
                log::warn!("stopped reading seeds from stdin: {err}");
                break;
            }
        }
    }
}

fn print_config(config: &WorkerConfig) -> Result<()> {
    let mut shown = config.clone();
    if shown.discovery.api_key.is_some() {
        shown.discovery.api_key = Some("<redacted>".to_string());
    }
    println!("{}", serde_json::to_string_pretty(&shown)?);
    Ok(())
}
