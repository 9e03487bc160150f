//! Watch command - run the monitor until interrupted.

use anyhow::Context;
use tokio_util::sync::CancellationToken;

use crate::config::Settings;
use crate::monitor::{self, MonitorError};

/// Run the watch command.
///
/// Returns the process exit status: 0 after a clean stop, 1 when no folder
/// could be watched.
pub async fn run(settings: Settings) -> anyhow::Result<u8> {
    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_token.cancel();
    });

    eprintln!(
        "Monitoring {} folder(s). Press Ctrl+C to stop",
        settings.monitor_folders.len()
    );

    match monitor::run(&settings, shutdown).await {
        Ok(summary) => {
            eprintln!(
                "Stopped: {} events dispatched ({} rate limited, {} failed deliveries)",
                summary.dispatch.events,
                summary.dispatch.rate_limited,
                summary.dispatch.hard_failures
            );
            Ok(0)
        }
        Err(MonitorError::Watch(e)) if e.is_fatal() => {
            eprintln!("Error: {e}");
            Ok(MonitorError::Watch(e).exit_code())
        }
        Err(e) => Err(e).context("monitor failed"),
    }
}

/// Resolve on Ctrl+C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("[watch] failed to listen for ctrl+c: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("[watch] failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    eprintln!("Received shutdown signal");
}
