//! Finkles CLI
//!
//! Deploys a local SummerCash node swarm from `.finkles.yaml`, or runs a
//! test script against one.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use finkles_core::config::{FinklesConfig, ScriptConfig, DEFAULT_CONFIG_FILE};
use finkles_core::swarm::{SwarmCoordinator, SwarmState};
use finkles_core::tools::terminal::run_steps;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Clone)]
#[command(
    author,
    version,
    about = "Finkles - deploy a new SummerCash network or manage an existing one"
)]
struct Args {
    /// Load configuration from FILE
    #[arg(short, long, global = true, value_name = "FILE", default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand, Clone)]
enum CliCommand {
    /// Spawn a node swarm from the configuration file and keep it running
    #[command(visible_alias = "s")]
    Spawn,
    /// Spawn the `test` script's swarm, run its steps, then shut it down
    #[command(visible_alias = "t")]
    Test,
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Cancel `token` on Ctrl-C
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received");
            token.cancel();
        }
    });
}

/// Start a swarm and run the script's steps against it.
///
/// The swarm is shut down if a step fails.
async fn start_script(script: &ScriptConfig, cancel: &CancellationToken) -> Result<SwarmState> {
    let mut coordinator = SwarmCoordinator::new(script.swarm_config());
    let state = match coordinator.start(cancel).await {
        Ok(state) => state,
        Err(e) if e.is_discovery() => {
            let binary = &coordinator.config().binary;
            return Err(anyhow::Error::new(e).context(format!(
                "Bootstrap node `{}` never reported its peer ID and listen address",
                binary
            )));
        }
        Err(e) => return Err(anyhow::Error::new(e).context("Failed to spawn swarm")),
    };

    if let Some(facts) = state.bootstrap() {
        println!("✅ Swarm of {} nodes is up", state.len());
        println!("   Bootstrap peer ID: {}", facts.peer_id());
        println!("   Bootstrap address: {}", facts.listen_addr());
    }

    let data_dir = coordinator.config().data_dir.as_deref();
    let results = match run_steps(&script.steps, data_dir).await {
        Ok(results) => results,
        Err(e) => {
            shutdown(state).await;
            return Err(e);
        }
    };

    if let Some(failed) = results.iter().find(|r| !r.success) {
        shutdown(state).await;
        anyhow::bail!(
            "step `{}` failed with exit code {:?}",
            failed.step,
            failed.exit_code
        );
    }

    Ok(state)
}

async fn shutdown(state: SwarmState) {
    if let Err(e) = state.shutdown().await {
        tracing::warn!(error = %e, "Swarm shutdown was incomplete");
    }
}

async fn spawn(config: &FinklesConfig) -> Result<()> {
    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    let state = start_script(config.spawn_script(), &cancel).await?;

    println!("   Press Ctrl-C to stop the swarm");
    cancel.cancelled().await;

    println!("🛑 Stopping {} nodes", state.len());
    state.shutdown().await.context("Failed to stop swarm")?;
    Ok(())
}

async fn test(config: &FinklesConfig) -> Result<()> {
    let script = config.test_script()?;

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    let state = start_script(script, &cancel).await?;
    state.shutdown().await.context("Failed to stop swarm")?;
    println!("✅ Test script passed");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level);

    let config = FinklesConfig::load(&args.config).await?;

    match args.command {
        CliCommand::Spawn => spawn(&config).await,
        CliCommand::Test => test(&config).await,
    }
}
