//! mimicbot CLI entry point.

use anyhow::{Context as _, anyhow};
use clap::Parser;
use mimicbot::cycle::scheduler::log_outcome;
use mimicbot::cycle::{CycleOutcome, GenerationCycle, Scheduler};
use mimicbot::llm::{ChatModel as _, OllamaClient};
use mimicbot::messaging::discord::{DiscordChannel, DiscordSession, wait_until_ready};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mimicbot")]
#[command(about = "Predicts the next message in a Discord channel with a local Ollama model")]
struct Cli {
    /// Path to a TOML config file (optional; the environment and .env win)
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Run a single cycle after the bot is ready, then exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.debug {
        "debug,serenity=info,h2=info,hyper=info"
    } else {
        "info,serenity=warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!("Starting mimicbot...");

    let config = if let Some(config_path) = &cli.config {
        mimicbot::config::Config::load_from_path(config_path)
            .with_context(|| format!("failed to load config from {}", config_path.display()))?
    } else {
        mimicbot::config::Config::load()
            .with_context(|| "failed to load configuration from environment and .env")?
    };

    tracing::info!(
        channel_id = config.discord.channel_id,
        model = %config.llm.model,
        state_file = %config.cycle.state_file.display(),
        min_interval_secs = config.cycle.min_interval_secs,
        tick_secs = config.cycle.tick_secs,
        "Configuration loaded"
    );

    let session = DiscordSession::connect(&config.discord)
        .await
        .with_context(|| "failed to connect to Discord")?;
    let mut ready = session.ready();
    let http = session.http();
    let cache = session.cache();
    let shard_manager = session.shard_manager();
    let mut gateway = tokio::spawn(session.run());

    // Nothing is scheduled until the gateway reports ready.
    let identity = tokio::select! {
        result = &mut gateway => {
            return Err(gateway_exit(result).context("gateway stopped before the ready event"));
        }
        identity = wait_until_ready(&mut ready) => {
            identity.with_context(|| "gateway never became ready")?
        }
    };

    let channel = DiscordChannel::resolve(http, cache, config.discord.channel_id)
        .await
        .with_context(|| format!("channel {} is unusable", config.discord.channel_id))?;

    let model = OllamaClient::new(&config.llm).with_context(|| "failed to build Ollama client")?;
    tracing::info!(
        endpoint = model.endpoint(),
        model = model.model_name(),
        "Ollama client ready"
    );

    let cycle = Arc::new(GenerationCycle::new(
        &config,
        Arc::new(channel),
        Arc::new(model),
        identity.id,
    ));

    if cli.once {
        let outcome = cycle.run().await;
        log_outcome(&outcome);
        shard_manager.shutdown_all().await;
        return match outcome {
            CycleOutcome::Failed { reason } => Err(anyhow!(reason)),
            _ => Ok(()),
        };
    }

    let scheduler = Scheduler::start(cycle, Duration::from_secs(config.cycle.tick_secs));

    let result = tokio::select! {
        result = &mut gateway => Err(gateway_exit(result)),
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
            Ok(())
        }
    };

    tracing::info!("Shutting down...");
    scheduler.shutdown().await;
    shard_manager.shutdown_all().await;

    tracing::info!("mimicbot stopped");
    result
}

/// Turn a finished gateway task into the error that ends the process.
fn gateway_exit(
    result: std::result::Result<mimicbot::Result<()>, tokio::task::JoinError>,
) -> anyhow::Error {
    match result {
        Ok(Ok(())) => anyhow!("Discord gateway closed"),
        Ok(Err(error)) => error.into(),
        Err(error) => anyhow!("Discord gateway task failed: {error}"),
    }
}
