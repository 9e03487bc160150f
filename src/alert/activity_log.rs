//! Persistent append-only activity log.
//!
//! One line per delivered event:
//!
//! ```text
//! 2024-05-01 14:03:22 - File Modified - /srv/data/report.csv
//! 2024-05-01 14:03:40 - Folder Moved - /srv/data/old -> /srv/data/new
//! 2024-05-01 14:04:02 - ERROR - [email] Transport timed out after 30s
//! ```

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::types::ChangeEvent;
use crate::utils::{format_timestamp, now_seconds};

use super::DeliveryError;

/// Handle to the activity log file.
///
/// Opened once at startup and shared explicitly (`Arc<ActivityLog>`) with the
/// components that write to it.
#[derive(Debug)]
pub struct ActivityLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl ActivityLog {
    /// Open (or create) the log for appending, creating parent directories.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append the line for a delivered event.
    pub fn append_event(&self, event: &ChangeEvent) -> io::Result<()> {
        self.append_line(&format_event_line(event))
    }

    /// Append a hard delivery failure of `channel`.
    pub fn append_failure(&self, channel: &str, error: &DeliveryError) -> io::Result<()> {
        let ts = format_timestamp(&now_seconds());
        self.append_line(&format!("{ts} - ERROR - [{channel}] {error}"))
    }

    pub fn flush(&self) -> io::Result<()> {
        let mut file = self.file.lock();
        file.flush()?;
        file.sync_data()
    }

    fn append_line(&self, line: &str) -> io::Result<()> {
        let mut file = self.file.lock();
        writeln!(file, "{line}")
    }
}

/// `timestamp - label - path[ -> destination]`
pub fn format_event_line(event: &ChangeEvent) -> String {
    format!(
        "{} - {} - {}",
        format_timestamp(&event.occurred_at()),
        event.label(),
        event.describe_paths()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Local, TimeZone};
    use tempfile::TempDir;

    #[test]
    fn test_open_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logs/nested/activity.log");

        let log = ActivityLog::open(&path).unwrap();
        assert!(path.exists());
        assert_eq!(log.path(), path);
    }

    #[test]
    fn test_lines_are_appended() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("activity.log");
        std::fs::write(&path, "existing line\n").unwrap();

        let ts = Local.with_ymd_and_hms(2024, 5, 1, 14, 3, 22).unwrap();
        let log = ActivityLog::open(&path).unwrap();
        log.append_event(&ChangeEvent::modified("/srv/a.csv".into(), ts, false))
            .unwrap();
        log.append_event(&ChangeEvent::moved(
            "/srv/old".into(),
            "/srv/new".into(),
            ts,
            true,
        ))
        .unwrap();
        log.append_failure("email", &DeliveryError::Transport("connection refused".into()))
            .unwrap();
        log.flush().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "existing line");
        assert_eq!(lines[1], "2024-05-01 14:03:22 - File Modified - /srv/a.csv");
        assert_eq!(lines[2], "2024-05-01 14:03:22 - Folder Moved - /srv/old -> /srv/new");
        assert!(lines[3].ends_with("- ERROR - [email] Transport error: connection refused"));
    }
}
