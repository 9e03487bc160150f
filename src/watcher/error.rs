//! Error types for the watch pipeline.

use std::path::PathBuf;
use thiserror::Error;

use super::SupervisorState;

/// Errors from watcher operations.
#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Failed to initialize watcher: {reason}")]
    InitFailed { reason: String },

    /// A single monitor target could not be watched. Recoverable: the target is skipped.
    #[error("Cannot watch path {path}: {reason}")]
    SetupFailed { path: PathBuf, reason: String },

    /// None of the configured targets could be watched.
    #[error("No valid folders to monitor ({attempted} configured, none watchable)")]
    NoTargets { attempted: usize },

    #[error("Cannot {operation} while supervisor is {state:?}")]
    InvalidState {
        operation: &'static str,
        state: SupervisorState,
    },

    #[error("Event stream already taken or closed")]
    ChannelClosed,
}

impl From<notify::Error> for WatchError {
    fn from(e: notify::Error) -> Self {
        WatchError::InitFailed {
            reason: e.to_string(),
        }
    }
}

impl WatchError {
    /// Map a notify error raised while watching `path` to a per-target setup failure.
    pub fn setup(path: impl Into<PathBuf>, err: notify::Error) -> Self {
        let reason = match &err.kind {
            notify::ErrorKind::PathNotFound => "path does not exist".to_string(),
            notify::ErrorKind::Io(io) if io.kind() == std::io::ErrorKind::PermissionDenied => {
                "permission denied".to_string()
            }
            _ => err.to_string(),
        };
        WatchError::SetupFailed {
            path: path.into(),
            reason,
        }
    }

    /// Whether this error must terminate the process.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            WatchError::NoTargets { .. } | WatchError::InitFailed { .. }
        )
    }
}
