//! Alert delivery for normalized change events.
//!
//! # Architecture
//!
//! ```text
//! Dispatcher ── RateLimiter (per-channel cooldowns)
//!     |
//!     +── LogChannel          -> ActivityLog (append-only file)
//!     +── NotificationChannel -> NotificationBackend (desktop)
//!     +── EmailChannel        -> MailTransport (SMTP)
//! ```
//!
//! Channels are built once from [`Settings`] and live for the whole run.

mod activity_log;
mod channel;
mod dispatcher;
pub mod email;
mod error;
mod log;
pub mod notification;
mod rate_limit;

use std::sync::Arc;
use std::time::Duration;

pub use activity_log::{ActivityLog, format_event_line};
pub use channel::AlertChannel;
pub use dispatcher::{DispatchReport, DispatchTotals, Dispatcher};
pub use email::{EmailChannel, EmailMessage, MailTransport, SmtpMailer};
pub use error::{DeliveryError, Severity};
pub use log::LogChannel;
pub use notification::{DesktopAlert, DesktopNotifier, NotificationBackend, NotificationChannel};
pub use rate_limit::{ChannelState, RateLimiter};

use crate::config::{ConfigError, Settings};

/// Create the enabled channels in delivery order: log, notification, email.
///
/// `activity_log` is `None` when the log file could not be opened; the run
/// continues without a log channel.
pub fn build_channels(
    settings: &Settings,
    activity_log: Option<Arc<ActivityLog>>,
) -> Result<Vec<Arc<dyn AlertChannel>>, ConfigError> {
    let mut channels: Vec<Arc<dyn AlertChannel>> = Vec::new();

    if let Some(log) = activity_log {
        channels.push(Arc::new(LogChannel::new(log)));
    }

    if settings.alerts.notifications {
        let display_for = Duration::from_millis(settings.alerts.notification_timeout_ms);
        channels.push(Arc::new(NotificationChannel::new(
            DesktopNotifier,
            settings.alerts.app_name.clone(),
            display_for,
        )));
    }

    if settings.alerts.email {
        let timeout = Duration::from_secs(settings.alerts.email_timeout_seconds);
        let mailer = SmtpMailer::new(
            &settings.smtp_server,
            settings.smtp_port,
            &settings.sender_email,
            settings.email_password.expose(),
            timeout,
        )
        .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        channels.push(Arc::new(
            EmailChannel::new(
                settings.sender_email.clone(),
                settings.receiver_emails.clone(),
                mailer,
            )
            .with_cooldown(settings.email_cooldown())
            .with_timeout(timeout),
        ));
    }

    Ok(channels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_build_channels_in_order() {
        let dir = TempDir::new().unwrap();
        let log = Arc::new(ActivityLog::open(dir.path().join("activity.log")).unwrap());
        let settings = Settings::example();

        let channels = build_channels(&settings, Some(log)).unwrap();
        let names: Vec<_> = channels.iter().map(|c| c.name().to_string()).collect();
        assert_eq!(names, vec!["log", "notification", "email"]);
        assert_eq!(channels[2].cooldown(), Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_disabled_channels_are_skipped() {
        let mut settings = Settings::example();
        settings.alerts.notifications = false;
        settings.alerts.email = false;

        let channels = build_channels(&settings, None).unwrap();
        assert!(channels.is_empty());
    }
}
