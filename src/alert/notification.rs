//! Desktop notification alert channel.
//!
//! Best effort: a missing notification server or a slow backend degrades the
//! channel silently instead of failing the event.

use std::time::Duration;

use async_trait::async_trait;

use crate::types::ChangeEvent;
use crate::utils::format_timestamp;

use super::{AlertChannel, DeliveryError};

/// Content of a desktop notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesktopAlert {
    pub app_name: String,
    pub title: String,
    pub body: String,
    /// How long the notification stays on screen.
    pub display_for: Duration,
}

/// Something that can put a notification on the user's desktop.
#[async_trait]
pub trait NotificationBackend: Send + Sync {
    fn name(&self) -> &str;

    async fn show(&self, alert: &DesktopAlert) -> Result<(), DeliveryError>;
}

/// Native notifications via `notify-rust` (D-Bus, macOS Notification Center, WinRT toasts).
#[derive(Debug, Default, Clone, Copy)]
pub struct DesktopNotifier;

#[async_trait]
impl NotificationBackend for DesktopNotifier {
    fn name(&self) -> &str {
        "desktop"
    }

    async fn show(&self, alert: &DesktopAlert) -> Result<(), DeliveryError> {
        let alert = alert.clone();
        let shown = tokio::task::spawn_blocking(move || {
            notify_rust::Notification::new()
                .appname(&alert.app_name)
                .summary(&alert.title)
                .body(&alert.body)
                .timeout(notify_rust::Timeout::Milliseconds(
                    u32::try_from(alert.display_for.as_millis()).unwrap_or(u32::MAX),
                ))
                .show()
                .map(|_| ())
                .map_err(|e| e.to_string())
        })
        .await;

        match shown {
            Ok(Ok(())) => Ok(()),
            Ok(Err(reason)) => Err(DeliveryError::Degraded {
                backend: self.name().to_string(),
                reason,
            }),
            Err(join) => Err(DeliveryError::Degraded {
                backend: self.name().to_string(),
                reason: join.to_string(),
            }),
        }
    }
}

/// Pops a desktop notification per event.
pub struct NotificationChannel {
    backend: Box<dyn NotificationBackend>,
    app_name: String,
    display_for: Duration,
    /// Upper bound on how long a backend may block the pipeline.
    timeout: Duration,
}

impl NotificationChannel {
    pub fn new(
        backend: impl NotificationBackend + 'static,
        app_name: impl Into<String>,
        display_for: Duration,
    ) -> Self {
        Self {
            backend: Box::new(backend),
            app_name: app_name.into(),
            display_for,
            timeout: display_for.max(Duration::from_secs(1)),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build the notification content for an event.
    pub fn compose(&self, event: &ChangeEvent) -> DesktopAlert {
        let path = event.path();
        let file = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let folder = path
            .parent()
            .map(|p| p.display().to_string())
            .unwrap_or_default();

        let mut body = format!(
            "File: {file}\nFolder: {folder}\nTime: {}",
            format_timestamp(&event.occurred_at())
        );
        if let Some(to) = event.secondary_path() {
            body.push_str(&format!("\nTo: {}", to.display()));
        }

        DesktopAlert {
            app_name: self.app_name.clone(),
            title: format!("{}: {}", self.app_name, event.label()),
            body,
            display_for: self.display_for,
        }
    }
}

#[async_trait]
impl AlertChannel for NotificationChannel {
    fn name(&self) -> &str {
        "notification"
    }

    async fn deliver(&self, event: &ChangeEvent) -> Result<(), DeliveryError> {
        let alert = self.compose(event);
        let backend = self.backend.name().to_string();

        // Every failure is swallowed here as a soft degradation
        match tokio::time::timeout(self.timeout, self.backend.show(&alert)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(DeliveryError::Degraded { backend, reason })) => {
                Err(DeliveryError::Degraded { backend, reason })
            }
            Ok(Err(e)) => Err(DeliveryError::Degraded {
                backend,
                reason: e.to_string(),
            }),
            Err(_) => Err(DeliveryError::Degraded {
                backend,
                reason: format!("no response within {:?}", self.timeout),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::Severity;
    use chrono::{Local, TimeZone};
    use std::sync::{Arc, Mutex};

    struct Recording(Arc<Mutex<Vec<DesktopAlert>>>);

    #[async_trait]
    impl NotificationBackend for Recording {
        fn name(&self) -> &str {
            "recording"
        }

        async fn show(&self, alert: &DesktopAlert) -> Result<(), DeliveryError> {
            self.0.lock().unwrap().push(alert.clone());
            Ok(())
        }
    }

    struct Broken;

    #[async_trait]
    impl NotificationBackend for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        async fn show(&self, _alert: &DesktopAlert) -> Result<(), DeliveryError> {
            Err(DeliveryError::Transport("org.freedesktop.Notifications not found".into()))
        }
    }

    struct Hanging;

    #[async_trait]
    impl NotificationBackend for Hanging {
        fn name(&self) -> &str {
            "hanging"
        }

        async fn show(&self, _alert: &DesktopAlert) -> Result<(), DeliveryError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }
    }

    fn event() -> ChangeEvent {
        let ts = Local.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap();
        ChangeEvent::modified("/srv/data/report.csv".into(), ts, false)
    }

    #[test]
    fn test_compose_content() {
        let channel = NotificationChannel::new(Broken, "FileGuard-FIM", Duration::from_secs(5));
        let alert = channel.compose(&event());

        assert_eq!(alert.title, "FileGuard-FIM: File Modified");
        assert_eq!(
            alert.body,
            "File: report.csv\nFolder: /srv/data\nTime: 2024-05-01 09:30:00"
        );
        assert_eq!(alert.display_for, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_backend_failure_is_soft() {
        let channel = NotificationChannel::new(Broken, "FileGuard-FIM", Duration::from_secs(5));
        let err = channel.deliver(&event()).await.unwrap_err();
        assert_eq!(err.severity(), Severity::Soft);
    }

    #[tokio::test]
    async fn test_hanging_backend_times_out_softly() {
        let channel = NotificationChannel::new(Hanging, "FileGuard-FIM", Duration::from_secs(5))
            .with_timeout(Duration::from_millis(20));
        let err = channel.deliver(&event()).await.unwrap_err();
        assert_eq!(err.severity(), Severity::Soft);
    }

    #[tokio::test]
    async fn test_successful_delivery_reaches_backend() {
        let shown = Arc::new(Mutex::new(Vec::new()));
        let channel = NotificationChannel::new(
            Recording(Arc::clone(&shown)),
            "FIM",
            Duration::from_secs(5),
        );
        channel.deliver(&event()).await.unwrap();

        let shown = shown.lock().unwrap();
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].title, "FIM: File Modified");
    }
}
