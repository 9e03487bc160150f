//! Diagnostic logging for the monitor process.
//!
//! Everything here goes to stderr and is meant for whoever runs the monitor.
//! File events themselves are recorded by the activity log in
//! [`crate::alert::ActivityLog`], never through `tracing`.
//!
//! Levels are configured per target in the `[logging]` table:
//!
//! ```toml
//! [logging]
//! default = "info"
//!
//! [logging.modules]
//! "fileguard::alert" = "debug"   # per-channel outcomes
//! lettre = "warn"                # SMTP session chatter
//! ```
//!
//! `RUST_LOG` replaces the table entirely:
//! ```bash
//! RUST_LOG=fileguard::watcher=trace fileguard watch
//! ```
//!
//! Lines carry a `[component]` tag so the pipeline stage is visible without
//! targets, e.g. `14:03:22.118  WARN fileguard::watcher::supervisor: [supervisor] skipping target: ...`.

use std::sync::Once;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::LoggingConfig;

static INIT: Once = Once::new();

/// Wall clock time of day with milliseconds.
struct CompactTime;

impl FormatTime for CompactTime {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", chrono::Local::now().format("%H:%M:%S%.3f"))
    }
}

/// Install the stderr subscriber. Only the first call has any effect.
///
/// At the default `info` level the log shows the folders being watched,
/// skipped folders, failed deliveries and the shutdown summary. `debug` adds
/// one line per event and per channel outcome.
pub fn init_with_config(config: &LoggingConfig) {
    INIT.call_once(|| {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_timer(CompactTime)
            .with_level(true)
            .with_filter(build_filter(config));

        // A test harness may have installed its own subscriber already
        let _ = tracing_subscriber::registry().with(fmt_layer).try_init();
    });
}

/// Install the subscriber at `info`.
pub fn init() {
    init_with_config(&LoggingConfig::default());
}

fn build_filter(config: &LoggingConfig) -> EnvFilter {
    if std::env::var("RUST_LOG").is_ok() {
        return EnvFilter::from_default_env();
    }

    let directives = filter_directives(config);
    EnvFilter::try_new(&directives).unwrap_or_else(|e| {
        // Subscriber is not up yet
        eprintln!("Ignoring invalid [logging] levels `{directives}`: {e}");
        EnvFilter::new(&config.default)
    })
}

/// `EnvFilter` directives for a config, e.g. `info,lettre=warn`.
pub fn filter_directives(config: &LoggingConfig) -> String {
    std::iter::once(config.default.clone())
        .chain(
            config
                .modules
                .iter()
                .map(|(target, level)| format!("{target}={level}")),
        )
        .collect::<Vec<_>>()
        .join(",")
}

/// Info line tagged with a pipeline component.
///
/// ```ignore
/// log_event!("watcher", "monitoring", "{}", path.display());
/// ```
#[macro_export]
macro_rules! log_event {
    ($component:expr, $event:expr) => {
        tracing::info!("[{}] {}", $component, $event)
    };
    ($component:expr, $event:expr, $($arg:tt)*) => {
        tracing::info!("[{}] {}: {}", $component, $event, format!($($arg)*))
    };
}

/// Warning tagged with a pipeline component, for conditions the run survives.
///
/// ```ignore
/// warn_event!("supervisor", "skipping target", "{e}");
/// ```
#[macro_export]
macro_rules! warn_event {
    ($component:expr, $event:expr) => {
        tracing::warn!("[{}] {}", $component, $event)
    };
    ($component:expr, $event:expr, $($arg:tt)*) => {
        tracing::warn!("[{}] {}: {}", $component, $event, format!($($arg)*))
    };
}

/// Debug line tagged with a pipeline component.
///
/// ```ignore
/// debug_event!("dispatch", "rate limited", "email");
/// ```
#[macro_export]
macro_rules! debug_event {
    ($component:expr, $event:expr) => {
        tracing::debug!("[{}] {}", $component, $event)
    };
    ($component:expr, $event:expr, $($arg:tt)*) => {
        tracing::debug!("[{}] {}: {}", $component, $event, format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_directives_keep_module_order() {
        let mut config = LoggingConfig::default();
        config.modules.insert("lettre".to_string(), "warn".to_string());
        config.modules.insert("fileguard::alert".to_string(), "debug".to_string());

        assert_eq!(
            filter_directives(&config),
            "info,lettre=warn,fileguard::alert=debug"
        );
    }

    #[test]
    fn test_filter_directives_default_only() {
        assert_eq!(filter_directives(&LoggingConfig::default()), "info");
    }

    #[test]
    fn test_invalid_module_level_is_rejected() {
        let mut config = LoggingConfig::default();
        config.modules.insert("lettre".to_string(), "loud".to_string());

        assert!(EnvFilter::try_new(filter_directives(&config)).is_err());
    }
}
