//! Alert channel trait.

use std::time::Duration;

use async_trait::async_trait;

use crate::types::ChangeEvent;

use super::DeliveryError;

/// One alert-delivery mechanism (activity log, desktop notification, email).
///
/// Channels are created once at startup and live for the whole run. The
/// dispatcher calls them sequentially and isolates their failures.
#[async_trait]
pub trait AlertChannel: Send + Sync {
    /// Channel name, used for logging and as the rate-limiter key.
    fn name(&self) -> &str;

    /// Minimum time between successful deliveries. Zero means unlimited.
    fn cooldown(&self) -> Duration {
        Duration::ZERO
    }

    /// Deliver a single event.
    async fn deliver(&self, event: &ChangeEvent) -> Result<(), DeliveryError>;

    /// Release resources at the end of the run.
    async fn shutdown(&self) {}
}
