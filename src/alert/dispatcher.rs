//! Fan-out of change events to alert channels.
//!
//! Each channel is attempted independently and in registration order. A
//! channel that errors, times out or panics is recorded and skipped; the
//! remaining channels still see the event and the caller never sees the error.

use std::sync::Arc;
use std::time::Instant;

use crate::types::ChangeEvent;

use super::{ActivityLog, AlertChannel, DeliveryError, RateLimiter, Severity};

/// Outcome of dispatching one event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Channels that accepted the event.
    pub delivered: Vec<String>,
    /// Channels skipped because their cooldown had not elapsed.
    pub rate_limited: Vec<String>,
    /// Channels whose delivery failed, with the failure severity.
    pub failed: Vec<(String, Severity)>,
}

impl DispatchReport {
    pub fn was_delivered(&self, channel: &str) -> bool {
        self.delivered.iter().any(|c| c == channel)
    }

    pub fn was_rate_limited(&self, channel: &str) -> bool {
        self.rate_limited.iter().any(|c| c == channel)
    }

    pub fn failure(&self, channel: &str) -> Option<Severity> {
        self.failed
            .iter()
            .find(|(c, _)| c == channel)
            .map(|(_, severity)| *severity)
    }
}

/// Running counters across all dispatched events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchTotals {
    pub events: u64,
    pub delivered: u64,
    pub rate_limited: u64,
    pub soft_failures: u64,
    pub hard_failures: u64,
}

struct Registered {
    name: String,
    channel: Arc<dyn AlertChannel>,
}

/// Delivers events to an ordered set of channels under a shared [`RateLimiter`].
pub struct Dispatcher {
    channels: Vec<Registered>,
    limiter: RateLimiter,
    failure_log: Option<Arc<ActivityLog>>,
    totals: DispatchTotals,
}

impl Dispatcher {
    /// Register `channels` in delivery order. Cooldowns are read once here.
    pub fn new(channels: Vec<Arc<dyn AlertChannel>>) -> Self {
        let mut limiter = RateLimiter::new();
        let channels = channels
            .into_iter()
            .map(|channel| {
                let name = channel.name().to_string();
                limiter.set_cooldown(&name, channel.cooldown());
                Registered { name, channel }
            })
            .collect();

        Self {
            channels,
            limiter,
            failure_log: None,
            totals: DispatchTotals::default(),
        }
    }

    /// Record hard failures in the activity log in addition to diagnostics.
    pub fn with_failure_log(mut self, log: Arc<ActivityLog>) -> Self {
        self.failure_log = Some(log);
        self
    }

    pub fn channel_names(&self) -> Vec<&str> {
        self.channels.iter().map(|r| r.name.as_str()).collect()
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn totals(&self) -> DispatchTotals {
        self.totals
    }

    pub async fn dispatch(&mut self, event: &ChangeEvent) -> DispatchReport {
        self.dispatch_at(event, Instant::now()).await
    }

    /// Dispatch `event` treating `now` as the current time for cooldown checks.
    pub async fn dispatch_at(&mut self, event: &ChangeEvent, now: Instant) -> DispatchReport {
        let mut report = DispatchReport::default();
        self.totals.events += 1;

        for registered in &self.channels {
            let name = registered.name.as_str();

            if !self.limiter.allow(name, now) {
                crate::debug_event!(
                    "dispatch",
                    "rate limited",
                    "{name} skipped {} (cooldown {:?})",
                    event.path().display(),
                    self.limiter.cooldown(name)
                );
                self.totals.rate_limited += 1;
                report.rate_limited.push(name.to_string());
                continue;
            }

            match deliver_isolated(Arc::clone(&registered.channel), event.clone()).await {
                Ok(()) => {
                    self.limiter.record_success(name, now);
                    self.totals.delivered += 1;
                    report.delivered.push(name.to_string());
                }
                Err(e) => {
                    let severity = e.severity();
                    match severity {
                        Severity::Soft => {
                            crate::debug_event!("dispatch", "degraded", "{name}: {e}");
                            self.totals.soft_failures += 1;
                        }
                        Severity::Hard => {
                            tracing::error!(
                                "[dispatch] {name} failed for {}: {e}",
                                event.path().display()
                            );
                            if let Some(log) = &self.failure_log {
                                if let Err(io) = log.append_failure(name, &e) {
                                    crate::warn_event!("dispatch", "could not record failure", "{io}");
                                }
                            }
                            self.totals.hard_failures += 1;
                        }
                    }
                    report.failed.push((name.to_string(), severity));
                }
            }
        }

        report
    }

    /// Give every channel a chance to flush and release resources.
    pub async fn shutdown(&mut self) {
        for registered in &self.channels {
            registered.channel.shutdown().await;
        }
        crate::debug_event!(
            "dispatch",
            "shutdown",
            "{} events, {} delivered, {} rate limited, {} soft / {} hard failures",
            self.totals.events,
            self.totals.delivered,
            self.totals.rate_limited,
            self.totals.soft_failures,
            self.totals.hard_failures
        );
    }
}

/// Run one delivery on its own task so a panicking channel is contained.
async fn deliver_isolated(
    channel: Arc<dyn AlertChannel>,
    event: ChangeEvent,
) -> Result<(), DeliveryError> {
    let handle = tokio::spawn(async move { channel.deliver(&event).await });
    match handle.await {
        Ok(result) => result,
        Err(join) => Err(DeliveryError::Panicked(join.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::now_seconds;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Counts calls; fails while `failures_left` is non-zero.
    struct Scripted {
        name: &'static str,
        cooldown: Duration,
        calls: AtomicUsize,
        failures_left: Mutex<usize>,
        soft: bool,
    }

    impl Scripted {
        fn ok(name: &'static str) -> Arc<Self> {
            Self::failing(name, 0)
        }

        fn failing(name: &'static str, failures: usize) -> Arc<Self> {
            Arc::new(Self {
                name,
                cooldown: Duration::ZERO,
                calls: AtomicUsize::new(0),
                failures_left: Mutex::new(failures),
                soft: false,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl AlertChannel for Scripted {
        fn name(&self) -> &str {
            self.name
        }

        fn cooldown(&self) -> Duration {
            self.cooldown
        }

        async fn deliver(&self, _event: &ChangeEvent) -> Result<(), DeliveryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut left = self.failures_left.lock().unwrap();
            if *left == 0 {
                return Ok(());
            }
            *left -= 1;
            if self.soft {
                Err(DeliveryError::Degraded {
                    backend: "test".into(),
                    reason: "no daemon".into(),
                })
            } else {
                Err(DeliveryError::Transport("connection refused".into()))
            }
        }
    }

    struct Panicking;

    #[async_trait]
    impl AlertChannel for Panicking {
        fn name(&self) -> &str {
            "panicking"
        }

        async fn deliver(&self, _event: &ChangeEvent) -> Result<(), DeliveryError> {
            panic!("channel bug");
        }
    }

    fn event() -> ChangeEvent {
        ChangeEvent::created("/watched/a.txt".into(), now_seconds(), false)
    }

    #[tokio::test]
    async fn test_failures_do_not_block_later_channels() {
        let email = Scripted::failing("email", usize::MAX);
        let log = Scripted::ok("log");
        let mut dispatcher = Dispatcher::new(vec![
            Arc::new(Panicking) as Arc<dyn AlertChannel>,
            email.clone(),
            log.clone(),
        ]);

        let report = dispatcher.dispatch(&event()).await;

        assert_eq!(report.failure("panicking"), Some(Severity::Hard));
        assert_eq!(report.failure("email"), Some(Severity::Hard));
        assert!(report.was_delivered("log"));
        assert_eq!(log.calls(), 1);
        assert_eq!(dispatcher.totals().hard_failures, 2);
    }

    #[tokio::test]
    async fn test_soft_failure_is_counted_separately() {
        let notification = Arc::new(Scripted {
            name: "notification",
            cooldown: Duration::ZERO,
            calls: AtomicUsize::new(0),
            failures_left: Mutex::new(1),
            soft: true,
        });
        let mut dispatcher = Dispatcher::new(vec![notification as Arc<dyn AlertChannel>]);

        let report = dispatcher.dispatch(&event()).await;
        assert_eq!(report.failure("notification"), Some(Severity::Soft));
        assert_eq!(dispatcher.totals().soft_failures, 1);
        assert_eq!(dispatcher.totals().hard_failures, 0);
    }

    #[tokio::test]
    async fn test_cooldown_allows_at_most_one_delivery() {
        let email = Arc::new(Scripted {
            name: "email",
            cooldown: Duration::from_secs(60),
            calls: AtomicUsize::new(0),
            failures_left: Mutex::new(0),
            soft: false,
        });
        let mut dispatcher = Dispatcher::new(vec![email.clone() as Arc<dyn AlertChannel>]);
        let t0 = Instant::now();

        let first = dispatcher.dispatch_at(&event(), t0).await;
        let second = dispatcher
            .dispatch_at(&event(), t0 + Duration::from_secs(30))
            .await;

        assert!(first.was_delivered("email"));
        assert!(second.was_rate_limited("email"));
        assert_eq!(email.calls(), 1);
    }

    #[tokio::test]
    async fn test_failed_send_then_success_after_cooldown() {
        let email = Arc::new(Scripted {
            name: "email",
            cooldown: Duration::from_secs(60),
            calls: AtomicUsize::new(0),
            failures_left: Mutex::new(1),
            soft: false,
        });
        let mut dispatcher = Dispatcher::new(vec![email.clone() as Arc<dyn AlertChannel>]);
        let t0 = Instant::now();
        let t1 = t0 + Duration::from_secs(61);

        let first = dispatcher.dispatch_at(&event(), t0).await;
        assert_eq!(first.failure("email"), Some(Severity::Hard));
        assert_eq!(dispatcher.limiter().last_success("email"), None);

        let second = dispatcher.dispatch_at(&event(), t1).await;
        assert!(second.was_delivered("email"));
        assert_eq!(dispatcher.limiter().last_success("email"), Some(t1));
        assert_eq!(email.calls(), 2);
    }

    #[tokio::test]
    async fn test_hard_failure_recorded_in_activity_log() {
        let dir = tempfile::TempDir::new().unwrap();
        let log = Arc::new(ActivityLog::open(dir.path().join("activity.log")).unwrap());
        let mut dispatcher =
            Dispatcher::new(vec![Scripted::failing("email", 1) as Arc<dyn AlertChannel>])
                .with_failure_log(Arc::clone(&log));

        dispatcher.dispatch(&event()).await;
        dispatcher.shutdown().await;

        let content = std::fs::read_to_string(log.path()).unwrap();
        assert!(content.contains("- ERROR - [email] Transport error: connection refused"));
    }

    #[test]
    fn test_channel_order_is_registration_order() {
        let dispatcher = Dispatcher::new(vec![
            Scripted::ok("log") as Arc<dyn AlertChannel>,
            Scripted::ok("notification"),
            Scripted::ok("email"),
        ]);
        assert_eq!(dispatcher.channel_names(), vec!["log", "notification", "email"]);
    }
}
