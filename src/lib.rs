//! FileGuard: a file-integrity monitor.
//!
//! Watches folders through the OS-native notification backend, normalizes
//! the raw notifications into [`ChangeEvent`]s and fans them out to alert
//! channels (activity log, desktop notification, rate-limited email).

pub mod alert;
pub mod cli;
pub mod config;
pub mod logging;
pub mod monitor;
pub mod types;
pub mod utils;
pub mod watcher;

pub use alert::{AlertChannel, DeliveryError, DispatchReport, Dispatcher, RateLimiter, Severity};
pub use config::{ConfigError, Settings};
pub use monitor::MonitorError;
pub use types::{ChangeEvent, ChangeKind, MonitorTarget};
pub use watcher::{EventSource, Normalizer, RawEvent, RawKind, Supervisor, SupervisorState, WatchError};
