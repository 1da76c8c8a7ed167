//! Main command -- starts the Commander loop

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::commander::Commander;
use crate::config::Configuration;
use crate::runtime::BollardRuntime;
use crate::task::Registry;

/// Run the Commander until an interrupt/terminate signal arrives.
pub async fn run(config: &Configuration) -> Result<()> {
    let tasks = Registry::global()
        .names()
        .into_iter()
        .filter_map(|name| Registry::global().lookup(name))
        .collect();

    let runtime = BollardRuntime::connect(&config.docker.socket)?;
    let commander = Commander::new(tasks, config.clone(), Box::new(runtime))?;

    let shutdown_token = CancellationToken::new();
    let signal_token = shutdown_token.clone();
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        info!("received shutdown signal");
        signal_token.cancel();
    });

    commander.start(shutdown_token).await;
    Ok(())
}

/// Wait for either SIGINT or SIGTERM (all other signals keep default
/// behaviour). On non-Unix targets only Ctrl+C is observable.
#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sig) => sig,
        Err(e) => {
            warn!("failed to install SIGTERM handler: {}", e);
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
