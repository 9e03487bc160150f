//! Error types for alert delivery.

use std::time::Duration;
use thiserror::Error;

/// How a delivery failure should be surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Expected degradation (e.g. no notification daemon). Logged at debug level only.
    Soft,
    /// Real failure. Logged as an error and written to the activity log.
    Hard,
}

/// A single channel failed to deliver an event.
///
/// Never escalated past the dispatcher.
#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{backend} unavailable: {reason}")]
    Degraded { backend: String, reason: String },

    #[error("Transport error: {0}")]
    Transport(String),

    /// Network channel exceeded its bounded timeout.
    #[error("Transport timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    #[error("Channel task failed: {0}")]
    Panicked(String),
}

impl DeliveryError {
    pub fn severity(&self) -> Severity {
        match self {
            DeliveryError::Degraded { .. } => Severity::Soft,
            _ => Severity::Hard,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, DeliveryError::Timeout(_))
    }
}
