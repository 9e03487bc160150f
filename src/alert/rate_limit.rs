//! Per-channel cooldown policy.

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Mutable per-channel state tracked by the rate limiter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelState {
    /// Time of the last successful delivery.
    pub last_success: Option<Instant>,
}

/// Decides whether a delivery attempt may proceed.
///
/// Only successful deliveries move the window; a failed attempt leaves the
/// previous success in place so the next attempt is not delayed further.
#[derive(Debug, Default)]
pub struct RateLimiter {
    cooldowns: HashMap<String, Duration>,
    states: HashMap<String, ChannelState>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the cooldown for a channel. Channels without one are never limited.
    pub fn set_cooldown(&mut self, channel: &str, cooldown: Duration) {
        if cooldown.is_zero() {
            self.cooldowns.remove(channel);
        } else {
            self.cooldowns.insert(channel.to_string(), cooldown);
        }
    }

    pub fn with_cooldown(mut self, channel: &str, cooldown: Duration) -> Self {
        self.set_cooldown(channel, cooldown);
        self
    }

    pub fn cooldown(&self, channel: &str) -> Duration {
        self.cooldowns.get(channel).copied().unwrap_or(Duration::ZERO)
    }

    /// True iff `now - last_success >= cooldown(channel)`.
    pub fn allow(&self, channel: &str, now: Instant) -> bool {
        let cooldown = self.cooldown(channel);
        if cooldown.is_zero() {
            return true;
        }
        match self.states.get(channel).and_then(|s| s.last_success) {
            Some(last) => now.saturating_duration_since(last) >= cooldown,
            None => true,
        }
    }

    /// Record a successful delivery at `now`.
    pub fn record_success(&mut self, channel: &str, now: Instant) {
        self.states
            .entry(channel.to_string())
            .or_default()
            .last_success = Some(now);
    }

    pub fn last_success(&self, channel: &str) -> Option<Instant> {
        self.states.get(channel).and_then(|s| s.last_success)
    }
}
