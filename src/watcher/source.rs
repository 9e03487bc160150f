//! Event sources: the OS-native watch mechanism behind a small trait.

use std::path::PathBuf;

use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::types::MonitorTarget;

use super::error::WatchError;
use super::event::{RawEvent, RawKind};

/// What a backend can and cannot report.
///
/// Callers inspect these to detect reduced fidelity instead of silently
/// missing event classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceCapabilities {
    /// Backend name for logging.
    pub backend: &'static str,
    /// Reports file opens/reads.
    pub supports_access_events: bool,
    /// Reports both halves of a rename with enough information to pair them.
    pub supports_rename_pairing: bool,
}

/// Produces raw filesystem notifications for a set of monitor targets.
pub trait EventSource: Send {
    fn capabilities(&self) -> SourceCapabilities;

    /// Start watching a single target.
    fn watch(&mut self, target: &MonitorTarget) -> Result<(), WatchError>;

    /// Take the stream of raw events. Returns `None` once taken.
    fn take_events(&mut self) -> Option<mpsc::Receiver<RawEvent>>;

    /// Release all watch handles. The event stream ends once buffered events are read.
    fn stop(&mut self);
}

/// Event source backed by `notify::RecommendedWatcher`.
///
/// The backend runs on its own thread and forwards classified events into a
/// bounded channel consumed by the supervisor loop.
pub struct NotifySource {
    watcher: Option<RecommendedWatcher>,
    events: Option<mpsc::Receiver<RawEvent>>,
    watched: Vec<PathBuf>,
}

impl NotifySource {
    /// Create a source whose channel buffers up to `buffer` events.
    pub fn new(buffer: usize) -> Result<Self, WatchError> {
        let (tx, rx) = mpsc::channel(buffer.max(1));

        let watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if let Some(raw) = classify(event) {
                    // Receiver gone means the supervisor stopped
                    let _ = tx.blocking_send(raw);
                }
            }
            Err(e) => {
                tracing::error!("[watcher] file watch error: {e}");
            }
        })?;

        Ok(Self {
            watcher: Some(watcher),
            events: Some(rx),
            watched: Vec::new(),
        })
    }

    /// Paths currently being watched (canonicalized).
    pub fn watched(&self) -> &[PathBuf] {
        &self.watched
    }
}

impl EventSource for NotifySource {
    fn capabilities(&self) -> SourceCapabilities {
        native_capabilities()
    }

    fn watch(&mut self, target: &MonitorTarget) -> Result<(), WatchError> {
        let watcher = self.watcher.as_mut().ok_or_else(|| WatchError::SetupFailed {
            path: target.path.clone(),
            reason: "source already stopped".to_string(),
        })?;

        let path = std::fs::canonicalize(&target.path).map_err(|e| WatchError::SetupFailed {
            path: target.path.clone(),
            reason: match e.kind() {
                std::io::ErrorKind::NotFound => "path does not exist".to_string(),
                std::io::ErrorKind::PermissionDenied => "permission denied".to_string(),
                _ => e.to_string(),
            },
        })?;

        if !path.is_dir() {
            return Err(WatchError::SetupFailed {
                path: target.path.clone(),
                reason: "not a directory".to_string(),
            });
        }

        let mode = if target.recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };

        watcher
            .watch(&path, mode)
            .map_err(|e| WatchError::setup(&target.path, e))?;

        crate::debug_event!("watcher", "watching", "{} ({mode:?})", path.display());
        self.watched.push(path);
        Ok(())
    }

    fn take_events(&mut self) -> Option<mpsc::Receiver<RawEvent>> {
        self.events.take()
    }

    fn stop(&mut self) {
        if let Some(mut watcher) = self.watcher.take() {
            for path in self.watched.drain(..) {
                if let Err(e) = watcher.unwatch(&path) {
                    crate::debug_event!("watcher", "unwatch failed", "{}: {e}", path.display());
                }
            }
            // Dropping the watcher shuts the backend down and closes the channel
            drop(watcher);
            crate::debug_event!("watcher", "released watch handles");
        }
    }
}

impl Drop for NotifySource {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Capabilities of the platform's recommended backend.
pub fn native_capabilities() -> SourceCapabilities {
    if cfg!(target_os = "linux") || cfg!(target_os = "android") {
        SourceCapabilities {
            backend: "inotify",
            supports_access_events: true,
            supports_rename_pairing: true,
        }
    } else if cfg!(target_os = "macos") {
        SourceCapabilities {
            backend: "fsevents",
            supports_access_events: false,
            supports_rename_pairing: false,
        }
    } else if cfg!(target_os = "windows") {
        SourceCapabilities {
            backend: "ReadDirectoryChangesW",
            supports_access_events: false,
            supports_rename_pairing: true,
        }
    } else {
        SourceCapabilities {
            backend: "kqueue",
            supports_access_events: false,
            supports_rename_pairing: false,
        }
    }
}

/// Convert a notify event into a raw event. Returns `None` for events without paths.
pub fn classify(event: Event) -> Option<RawEvent> {
    if event.need_rescan() {
        tracing::warn!("[watcher] backend queue overflowed; some changes may have been missed");
    }

    if event.paths.is_empty() {
        return None;
    }

    let tracker = event.tracker();
    let (kind, dir_hint) = match event.kind {
        EventKind::Create(CreateKind::Folder) => (RawKind::Created, Some(true)),
        EventKind::Create(CreateKind::File) => (RawKind::Created, Some(false)),
        EventKind::Create(_) => (RawKind::Created, None),
        EventKind::Modify(ModifyKind::Name(mode)) => {
            let kind = match mode {
                RenameMode::From => RawKind::RenameFrom,
                RenameMode::To => RawKind::RenameTo,
                RenameMode::Both if event.paths.len() >= 2 => RawKind::RenameBoth,
                _ => RawKind::RenameAny,
            };
            (kind, None)
        }
        EventKind::Modify(_) => (RawKind::Modified, None),
        EventKind::Remove(RemoveKind::Folder) => (RawKind::Removed, Some(true)),
        EventKind::Remove(RemoveKind::File) => (RawKind::Removed, Some(false)),
        EventKind::Remove(_) => (RawKind::Removed, None),
        EventKind::Access(_) => (RawKind::Accessed, None),
        EventKind::Any | EventKind::Other => (RawKind::Other, None),
    };

    let mut raw = RawEvent::new(kind, event.paths);
    raw.tracker = tracker;
    raw.dir_hint = dir_hint;
    Some(raw)
}
