use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Canonical kind of a filesystem change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeKind {
    Created,
    Modified,
    Deleted,
    Moved,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Created => "Created",
            ChangeKind::Modified => "Modified",
            ChangeKind::Deleted => "Deleted",
            ChangeKind::Moved => "Moved",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A normalized, deduplicated filesystem change.
///
/// Built only through the kind-specific constructors, so a destination path
/// exists exactly when the kind is [`ChangeKind::Moved`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    kind: ChangeKind,
    path: PathBuf,
    secondary_path: Option<PathBuf>,
    occurred_at: DateTime<Local>,
    is_directory: bool,
}

impl ChangeEvent {
    pub fn created(path: PathBuf, occurred_at: DateTime<Local>, is_directory: bool) -> Self {
        Self::single(ChangeKind::Created, path, occurred_at, is_directory)
    }

    pub fn modified(path: PathBuf, occurred_at: DateTime<Local>, is_directory: bool) -> Self {
        Self::single(ChangeKind::Modified, path, occurred_at, is_directory)
    }

    pub fn deleted(path: PathBuf, occurred_at: DateTime<Local>, is_directory: bool) -> Self {
        Self::single(ChangeKind::Deleted, path, occurred_at, is_directory)
    }

    pub fn moved(
        from: PathBuf,
        to: PathBuf,
        occurred_at: DateTime<Local>,
        is_directory: bool,
    ) -> Self {
        Self {
            kind: ChangeKind::Moved,
            path: from,
            secondary_path: Some(to),
            occurred_at: crate::utils::truncate_to_seconds(occurred_at),
            is_directory,
        }
    }

    fn single(
        kind: ChangeKind,
        path: PathBuf,
        occurred_at: DateTime<Local>,
        is_directory: bool,
    ) -> Self {
        debug_assert!(kind != ChangeKind::Moved);
        Self {
            kind,
            path,
            secondary_path: None,
            occurred_at: crate::utils::truncate_to_seconds(occurred_at),
            is_directory,
        }
    }

    /// Same event, stamped with a later occurrence time.
    pub(crate) fn restamped(mut self, occurred_at: DateTime<Local>) -> Self {
        self.occurred_at = crate::utils::truncate_to_seconds(occurred_at);
        self
    }

    pub fn kind(&self) -> ChangeKind {
        self.kind
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Destination of a move; `None` for every other kind.
    pub fn secondary_path(&self) -> Option<&Path> {
        self.secondary_path.as_deref()
    }

    pub fn occurred_at(&self) -> DateTime<Local> {
        self.occurred_at
    }

    pub fn is_directory(&self) -> bool {
        self.is_directory
    }

    /// Human-readable label, e.g. "File Modified" or "Folder Created".
    pub fn label(&self) -> String {
        let subject = if self.is_directory { "Folder" } else { "File" };
        format!("{subject} {}", self.kind)
    }

    /// Subject path, with the destination appended for moves.
    pub fn describe_paths(&self) -> String {
        match &self.secondary_path {
            Some(to) => format!("{} -> {}", self.path.display(), to.display()),
            None => self.path.display().to_string(),
        }
    }
}

/// A directory to watch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MonitorTarget {
    pub path: PathBuf,
    pub recursive: bool,
}

impl MonitorTarget {
    pub fn new(path: impl Into<PathBuf>, recursive: bool) -> Self {
        Self {
            path: path.into(),
            recursive,
        }
    }

    pub fn recursive(path: impl Into<PathBuf>) -> Self {
        Self::new(path, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Local> {
        Local.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_only_moves_carry_destination() {
        let created = ChangeEvent::created("/w/a".into(), at(10), false);
        let modified = ChangeEvent::modified("/w/a".into(), at(10), false);
        let deleted = ChangeEvent::deleted("/w/a".into(), at(10), true);
        let moved = ChangeEvent::moved("/w/a".into(), "/w/b".into(), at(10), false);

        assert!(created.secondary_path().is_none());
        assert!(modified.secondary_path().is_none());
        assert!(deleted.secondary_path().is_none());
        assert_eq!(moved.secondary_path(), Some(Path::new("/w/b")));
        assert_eq!(moved.path(), Path::new("/w/a"));
    }

    #[test]
    fn test_timestamps_have_second_resolution() {
        let precise = Local.timestamp_opt(1_700_000_000, 987_654_321).unwrap();
        let event = ChangeEvent::created("/w/a".into(), precise, false);
        assert_eq!(event.occurred_at(), at(1_700_000_000));
    }

    #[test]
    fn test_labels() {
        let file = ChangeEvent::modified("/w/a.txt".into(), at(1), false);
        let dir = ChangeEvent::created("/w/sub".into(), at(1), true);
        let moved = ChangeEvent::moved("/w/a".into(), "/w/b".into(), at(1), false);

        assert_eq!(file.label(), "File Modified");
        assert_eq!(dir.label(), "Folder Created");
        assert_eq!(moved.describe_paths(), "/w/a -> /w/b");
    }
}
