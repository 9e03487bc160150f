//! End-to-end wiring of a monitoring run from [`Settings`].

use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::alert::{self, ActivityLog, Dispatcher};
use crate::config::{ConfigError, Settings};
use crate::watcher::{EventSource, NotifySource, RunSummary, Supervisor, WatchError};

/// Errors that end a run before or instead of a clean stop.
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Watch(#[from] WatchError),
}

impl MonitorError {
    /// Process exit status for this error.
    pub fn exit_code(&self) -> u8 {
        1
    }
}

/// Watch the configured folders with the native backend until `shutdown` fires.
pub async fn run(settings: &Settings, shutdown: CancellationToken) -> Result<RunSummary, MonitorError> {
    let source = NotifySource::new(settings.watcher.event_buffer)?;
    run_with_source(settings, source, shutdown).await
}

/// Same as [`run`] with a caller-provided event source.
pub async fn run_with_source<S: EventSource>(
    settings: &Settings,
    source: S,
    shutdown: CancellationToken,
) -> Result<RunSummary, MonitorError> {
    let activity_log = match ActivityLog::open(&settings.alerts.log_path) {
        Ok(log) => {
            crate::debug_event!("monitor", "activity log", "{}", log.path().display());
            Some(Arc::new(log))
        }
        Err(e) => {
            tracing::warn!(
                "[monitor] cannot open activity log {}: {e}; continuing without it",
                settings.alerts.log_path.display()
            );
            None
        }
    };

    let channels = alert::build_channels(settings, activity_log.clone())?;
    let mut dispatcher = Dispatcher::new(channels);
    if let Some(log) = activity_log {
        dispatcher = dispatcher.with_failure_log(log);
    }
    crate::debug_event!(
        "monitor",
        "channels",
        "{}",
        dispatcher.channel_names().join(", ")
    );

    let mut supervisor = Supervisor::new(
        source,
        settings.targets(),
        settings.normalizer_config(),
        dispatcher,
    )
    .with_tick(settings.tick());

    supervisor.start()?;
    let summary = supervisor.run(shutdown).await?;
    Ok(summary)
}
