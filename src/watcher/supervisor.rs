//! Watch lifecycle: start, run loop, graceful stop.

use std::fmt;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::alert::{DispatchTotals, Dispatcher};
use crate::types::{ChangeEvent, MonitorTarget};

use super::error::WatchError;
use super::event::RawEvent;
use super::normalizer::{Normalizer, NormalizerConfig, NormalizerStats};
use super::source::EventSource;

/// Default interval at which coalesced events are checked for release.
pub const DEFAULT_TICK: Duration = Duration::from_millis(100);

/// How long the stop path waits for the source to hand over buffered events.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_millis(250);

/// Lifecycle states.
///
/// ```text
/// Idle -> Starting -> Running -> Stopping -> Stopped
///            |                                  ^
///            +---------- no targets ------------+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Idle,
    Starting,
    Running,
    Stopping,
    Stopped,
}

impl SupervisorState {
    pub fn can_transition_to(self, next: SupervisorState) -> bool {
        use SupervisorState::*;
        matches!(
            (self, next),
            (Idle, Starting)
                | (Starting, Running)
                | (Starting, Stopped)
                | (Running, Stopping)
                | (Stopping, Stopped)
        )
    }

    pub fn is_terminal(self) -> bool {
        self == SupervisorState::Stopped
    }
}

impl fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SupervisorState::Idle => "idle",
            SupervisorState::Starting => "starting",
            SupervisorState::Running => "running",
            SupervisorState::Stopping => "stopping",
            SupervisorState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Result of [`Supervisor::start`].
#[derive(Debug, Default)]
pub struct StartReport {
    pub watched: Vec<PathBuf>,
    /// Targets that could not be watched, with the reason.
    pub skipped: Vec<(PathBuf, WatchError)>,
}

/// Counters for a completed run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub normalizer: NormalizerStats,
    pub dispatch: DispatchTotals,
}

/// Wires an [`EventSource`] through the [`Normalizer`] into the [`Dispatcher`].
pub struct Supervisor<S: EventSource> {
    source: S,
    targets: Vec<MonitorTarget>,
    normalizer: Normalizer,
    dispatcher: Dispatcher,
    events: Option<mpsc::Receiver<RawEvent>>,
    state: SupervisorState,
    history: Vec<SupervisorState>,
    tick: Duration,
    drain_timeout: Duration,
}

impl<S: EventSource> Supervisor<S> {
    pub fn new(
        source: S,
        targets: Vec<MonitorTarget>,
        normalizer: NormalizerConfig,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            source,
            targets,
            normalizer: Normalizer::new(normalizer),
            dispatcher,
            events: None,
            state: SupervisorState::Idle,
            history: vec![SupervisorState::Idle],
            tick: DEFAULT_TICK,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        }
    }

    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    /// Every state entered so far, starting with `Idle`.
    pub fn history(&self) -> &[SupervisorState] {
        &self.history
    }

    pub fn targets(&self) -> &[MonitorTarget] {
        &self.targets
    }

    /// Install watches for every target.
    ///
    /// A target that cannot be watched is skipped with a warning. Fails with
    /// [`WatchError::NoTargets`] (and ends in `Stopped`) if none succeed.
    pub fn start(&mut self) -> Result<StartReport, WatchError> {
        if self.state != SupervisorState::Idle {
            return Err(WatchError::InvalidState {
                operation: "start",
                state: self.state,
            });
        }
        self.transition(SupervisorState::Starting);

        let caps = self.source.capabilities();
        crate::log_event!(
            "supervisor",
            "backend",
            "{} (access events: {}, rename pairing: {})",
            caps.backend,
            caps.supports_access_events,
            caps.supports_rename_pairing
        );
        if !caps.supports_rename_pairing {
            crate::debug_event!(
                "supervisor",
                "reduced fidelity",
                "renames may be reported as separate create/delete events"
            );
        }

        let mut report = StartReport::default();
        for target in &self.targets {
            match self.source.watch(target) {
                Ok(()) => {
                    crate::log_event!("watcher", "monitoring", "{}", target.path.display());
                    report.watched.push(target.path.clone());
                }
                Err(e) => {
                    crate::warn_event!("supervisor", "skipping target", "{e}");
                    report.skipped.push((target.path.clone(), e));
                }
            }
        }

        if report.watched.is_empty() {
            self.source.stop();
            self.transition(SupervisorState::Stopped);
            return Err(WatchError::NoTargets {
                attempted: self.targets.len(),
            });
        }

        match self.source.take_events() {
            Some(rx) => self.events = Some(rx),
            None => {
                self.source.stop();
                self.transition(SupervisorState::Stopped);
                return Err(WatchError::ChannelClosed);
            }
        }

        self.transition(SupervisorState::Running);
        crate::log_event!(
            "supervisor",
            "started",
            "{} of {} targets",
            report.watched.len(),
            self.targets.len()
        );
        Ok(report)
    }

    /// Process events until `shutdown` fires, then drain and stop.
    ///
    /// Delivery failures never end the loop. Returns once the supervisor is
    /// `Stopped`.
    pub async fn run(&mut self, shutdown: CancellationToken) -> Result<RunSummary, WatchError> {
        if self.state != SupervisorState::Running {
            return Err(WatchError::InvalidState {
                operation: "run",
                state: self.state,
            });
        }
        let mut events = self.events.take().ok_or(WatchError::ChannelClosed)?;

        let mut ticker = tokio::time::interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    crate::debug_event!("supervisor", "stop requested");
                    break;
                }

                maybe = events.recv() => match maybe {
                    Some(raw) => self.handle_raw(raw).await,
                    None => {
                        crate::warn_event!("supervisor", "event source closed unexpectedly");
                        break;
                    }
                },

                _ = ticker.tick() => {
                    let ready = self.normalizer.take_ready(Instant::now());
                    self.dispatch_all(ready).await;
                }
            }
        }

        self.stop(events).await;
        Ok(self.summary())
    }

    fn summary(&self) -> RunSummary {
        RunSummary {
            normalizer: self.normalizer.stats(),
            dispatch: self.dispatcher.totals(),
        }
    }

    async fn stop(&mut self, mut events: mpsc::Receiver<RawEvent>) {
        self.transition(SupervisorState::Stopping);
        self.source.stop();

        // Whatever the source already queued is still processed
        loop {
            match tokio::time::timeout(self.drain_timeout, events.recv()).await {
                Ok(Some(raw)) => self.handle_raw(raw).await,
                Ok(None) => break,
                Err(_) => {
                    crate::debug_event!(
                        "supervisor",
                        "drain",
                        "source still open after {:?}",
                        self.drain_timeout
                    );
                    break;
                }
            }
        }

        let pending = self.normalizer.flush();
        self.dispatch_all(pending).await;
        self.dispatcher.shutdown().await;

        self.transition(SupervisorState::Stopped);
        let summary = self.summary();
        crate::log_event!(
            "supervisor",
            "stopped",
            "{} notifications, {} events dispatched",
            summary.normalizer.received,
            summary.dispatch.events
        );
    }

    async fn handle_raw(&mut self, raw: RawEvent) {
        let ready = self.normalizer.push(raw, Instant::now());
        self.dispatch_all(ready).await;
    }

    async fn dispatch_all(&mut self, events: Vec<ChangeEvent>) {
        for event in events {
            crate::debug_event!(
                "supervisor",
                "event",
                "{} {}",
                event.label(),
                event.describe_paths()
            );
            self.dispatcher.dispatch(&event).await;
        }
    }

    fn transition(&mut self, next: SupervisorState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid transition {} -> {next}",
            self.state
        );
        crate::debug_event!("supervisor", "state", "{} -> {next}", self.state);
        self.state = next;
        self.history.push(next);
    }
}
