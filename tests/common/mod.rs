//! Shared fixtures for integration tests.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use fileguard::alert::{AlertChannel, DeliveryError};
use fileguard::watcher::{EventSource, RawEvent, SourceCapabilities, WatchError};
use fileguard::{ChangeEvent, MonitorTarget};
use tokio::sync::mpsc;

/// Event source driven by the test through an mpsc sender.
pub struct ScriptedSource {
    tx: Option<mpsc::Sender<RawEvent>>,
    rx: Option<mpsc::Receiver<RawEvent>>,
    unwatchable: Vec<PathBuf>,
    pub watched: Vec<PathBuf>,
    stopped: Arc<AtomicBool>,
}

impl ScriptedSource {
    pub fn new() -> (Self, mpsc::Sender<RawEvent>) {
        let (tx, rx) = mpsc::channel(256);
        let source = Self {
            tx: Some(tx.clone()),
            rx: Some(rx),
            unwatchable: Vec::new(),
            watched: Vec::new(),
            stopped: Arc::new(AtomicBool::new(false)),
        };
        (source, tx)
    }

    /// Make `watch` fail for `path` as if it did not exist.
    pub fn unwatchable(mut self, path: impl Into<PathBuf>) -> Self {
        self.unwatchable.push(path.into());
        self
    }

    pub fn stopped_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stopped)
    }
}

impl EventSource for ScriptedSource {
    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities {
            backend: "scripted",
            supports_access_events: false,
            supports_rename_pairing: true,
        }
    }

    fn watch(&mut self, target: &MonitorTarget) -> Result<(), WatchError> {
        if self.unwatchable.iter().any(|p| p == &target.path) {
            return Err(WatchError::SetupFailed {
                path: target.path.clone(),
                reason: "path does not exist".to_string(),
            });
        }
        self.watched.push(target.path.clone());
        Ok(())
    }

    fn take_events(&mut self) -> Option<mpsc::Receiver<RawEvent>> {
        self.rx.take()
    }

    fn stop(&mut self) {
        self.tx = None;
        self.stopped.store(true, Ordering::SeqCst);
    }
}

/// Records every delivered event.
#[derive(Clone)]
pub struct RecordingChannel {
    name: &'static str,
    pub events: Arc<Mutex<Vec<ChangeEvent>>>,
}

impl RecordingChannel {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn delivered(&self) -> Vec<ChangeEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl AlertChannel for RecordingChannel {
    fn name(&self) -> &str {
        self.name
    }

    async fn deliver(&self, event: &ChangeEvent) -> Result<(), DeliveryError> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

/// Always fails; soft failures mimic a missing notification daemon.
#[derive(Clone)]
pub struct FailingChannel {
    name: &'static str,
    soft: bool,
    pub calls: Arc<AtomicUsize>,
}

impl FailingChannel {
    pub fn hard(name: &'static str) -> Self {
        Self {
            name,
            soft: false,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn soft(name: &'static str) -> Self {
        Self {
            soft: true,
            ..Self::hard(name)
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AlertChannel for FailingChannel {
    fn name(&self) -> &str {
        self.name
    }

    async fn deliver(&self, _event: &ChangeEvent) -> Result<(), DeliveryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.soft {
            Err(DeliveryError::Degraded {
                backend: "desktop".to_string(),
                reason: "no notification server".to_string(),
            })
        } else {
            Err(DeliveryError::Transport("connection refused".to_string()))
        }
    }
}

pub fn read_lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}
