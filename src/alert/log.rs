//! Activity-log alert channel.

use std::sync::Arc;

use async_trait::async_trait;

use crate::types::ChangeEvent;

use super::{ActivityLog, AlertChannel, DeliveryError};

/// Writes every event to the activity log. Never rate-limited.
pub struct LogChannel {
    log: Arc<ActivityLog>,
}

impl LogChannel {
    pub fn new(log: Arc<ActivityLog>) -> Self {
        Self { log }
    }
}

#[async_trait]
impl AlertChannel for LogChannel {
    fn name(&self) -> &str {
        "log"
    }

    async fn deliver(&self, event: &ChangeEvent) -> Result<(), DeliveryError> {
        self.log.append_event(event)?;
        Ok(())
    }

    async fn shutdown(&self) {
        if let Err(e) = self.log.flush() {
            crate::warn_event!("log", "flush failed", "{}: {e}", self.log.path().display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::now_seconds;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_deliver_appends_line() {
        let dir = TempDir::new().unwrap();
        let log = Arc::new(ActivityLog::open(dir.path().join("activity.log")).unwrap());
        let channel = LogChannel::new(Arc::clone(&log));

        let event = ChangeEvent::created("/w/a.txt".into(), now_seconds(), false);
        channel.deliver(&event).await.unwrap();
        channel.shutdown().await;

        let content = std::fs::read_to_string(log.path()).unwrap();
        assert!(content.contains("File Created - /w/a.txt"));
        assert!(channel.cooldown().is_zero());
    }
}
