use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

use chat_relay::commands;
use chat_relay::config::{self, Config};
use chat_relay::error::Result;
use chat_relay::logging;
use chat_relay::media::LocalMediaFiles;
use chat_relay::metrics::Metrics;
use chat_relay::plugin::{initialize, Pipeline, PluginFactories, PluginRegistry};
use chat_relay::relay::Forwarder;
use chat_relay::stdio::{self, StdioTransport, StdoutDelivery};

#[derive(Parser, Debug)]
#[command(name = "chat-relay")]
#[command(about = "Forward chat messages through an ordered chain of plugins", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file (YAML/JSON/TOML)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Print Prometheus metrics to stderr when the run ends
    #[arg(long, global = true)]
    metrics: bool,
}

#[derive(Debug, clap::Subcommand)]
enum Command {
    /// Forward JSON-lines messages from stdin to stdout (default)
    Run,
    /// Check configuration and plugin loading
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse();

    // Load configuration before logging so its logging section applies
    let config = match &args.config {
        Some(path) => config::load_from_path(path).await,
        None => config::load_from_env_or_file().await,
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return Err(e);
        }
    };

    let _log_guard = logging::init(&config.logging, args.debug)?;
    match &args.config {
        Some(path) => info!("Configuration loaded from {}", path.display()),
        None => info!("Configuration loaded from default locations"),
    }

    let factories = PluginFactories::builtin();

    match args.command.unwrap_or(Command::Run) {
        Command::Check => commands::run_config_check(&config, &factories).await,
        Command::Run => run(config, &factories, args.metrics).await,
    }
}

async fn run(config: Config, factories: &PluginFactories, print_metrics: bool) -> Result<()> {
    info!("Starting chat relay");
    info!("Loaded {} plugin configurations", config.plugins.len());

    let registry = PluginRegistry::build(&config.plugins, factories);
    let ready = match initialize(
        registry,
        config.pipeline.init_policy,
        config.pipeline.init_timeout_ms,
    )
    .await
    {
        Ok(ready) => ready,
        Err(e) => {
            error!("Plugin initialization failed: {}", e);
            return Err(e);
        }
    };
    info!("Plugin chain: [{}]", ready.ids().join(", "));

    let metrics = Arc::new(Metrics::new());
    let pipeline = Pipeline::new(
        ready,
        Arc::new(LocalMediaFiles),
        config.pipeline.download_dir.clone(),
    )
    .with_metrics(metrics.clone());

    let forwarder = Forwarder::new(Arc::new(pipeline), Arc::new(StdoutDelivery::new()))
        .with_message_timeout(config.pipeline.message_timeout_ms);
    let transport = StdioTransport::new();

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
    };

    match stdio::run_until(&forwarder, &transport, shutdown).await? {
        Some(summary) => info!(
            delivered = summary.delivered,
            vetoed = summary.vetoed,
            failed = summary.failed,
            malformed = summary.malformed,
            "Input exhausted"
        ),
        None => info!("Run interrupted"),
    }

    if print_metrics {
        eprint!("{}", metrics.render());
    }

    Ok(())
}
