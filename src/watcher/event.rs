//! Raw notifications as reported by an [`EventSource`](super::EventSource).

use std::path::PathBuf;

use chrono::{DateTime, Local};

/// Native notification class, before normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RawKind {
    Created,
    Modified,
    Removed,
    /// Old half of a rename reported as two notifications.
    RenameFrom,
    /// New half of a rename reported as two notifications.
    RenameTo,
    /// Rename carrying both paths: `[old, new]`.
    RenameBoth,
    /// Rename without pairing information (one path, unknown side).
    RenameAny,
    Accessed,
    Other,
}

/// Unprocessed notification from the OS watch backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    pub kind: RawKind,
    pub paths: Vec<PathBuf>,
    /// Backend cookie linking the halves of a rename, when available.
    pub tracker: Option<usize>,
    /// Whether the backend already told us the subject is a directory.
    pub dir_hint: Option<bool>,
    pub observed_at: DateTime<Local>,
}

impl RawEvent {
    pub fn new(kind: RawKind, paths: Vec<PathBuf>) -> Self {
        Self {
            kind,
            paths,
            tracker: None,
            dir_hint: None,
            observed_at: Local::now(),
        }
    }

    pub fn single(kind: RawKind, path: impl Into<PathBuf>) -> Self {
        Self::new(kind, vec![path.into()])
    }

    pub fn with_tracker(mut self, tracker: usize) -> Self {
        self.tracker = Some(tracker);
        self
    }

    pub fn with_dir_hint(mut self, is_dir: bool) -> Self {
        self.dir_hint = Some(is_dir);
        self
    }

    pub fn observed_at(mut self, ts: DateTime<Local>) -> Self {
        self.observed_at = ts;
        self
    }

    /// First reported path.
    pub fn primary_path(&self) -> Option<&PathBuf> {
        self.paths.first()
    }

    pub fn is_rename(&self) -> bool {
        matches!(
            self.kind,
            RawKind::RenameFrom | RawKind::RenameTo | RawKind::RenameBoth | RawKind::RenameAny
        )
    }
}
