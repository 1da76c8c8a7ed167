//! Task Commander -- periodic task orchestrator
//!
//! Runs declared tasks on their own cadence, each inside an isolated
//! container image built on demand (or in-process, in containerless mode),
//! and collects their outputs for an external report builder to assemble.

use anyhow::Result;
use clap::Parser;
use tracing::error;

use task_commander::cmd;
use task_commander::config::Configuration;

#[derive(Parser)]
#[command(name = "task-commander")]
#[command(about = "Periodic task orchestrator running containerised and containerless tasks")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<cmd::Commands>,

    /// Path to configuration file
    #[arg(short, long, default_value = "commander.toml")]
    config: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("task_commander={}", log_level).into()),
        )
        .init();

    let config = Configuration::load(&cli.config)?;

    match cli.command {
        Some(cmd::Commands::Diagnostics) => {
            cmd::diagnostics::run(&config).await?;
        }
        Some(cmd::Commands::Launch { outdir, task, params }) => {
            cmd::launch::run(&outdir, &task, &params).await?;
        }
        None => {
            if let Err(e) = cmd::root::run(&config).await {
                error!("commander error: {}", e);
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
