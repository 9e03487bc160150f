//! Filesystem watching and event normalization.
//!
//! # Architecture
//!
//! ```text
//! EventSource (notify backend thread)
//!     | RawEvent (bounded mpsc)
//!     v
//! Supervisor run loop ── tick ──> Normalizer::take_ready
//!     | Normalizer::push
//!     v
//! ChangeEvent -> alert::Dispatcher
//! ```
//!
//! The supervisor owns the lifecycle; everything downstream of the source runs
//! on a single task.

mod error;
mod event;
mod normalizer;
mod source;
mod supervisor;

pub use error::WatchError;
pub use event::{RawEvent, RawKind};
pub use normalizer::{DEFAULT_RENAME_GRACE, Normalizer, NormalizerConfig, NormalizerStats};
pub use source::{EventSource, NotifySource, SourceCapabilities, classify, native_capabilities};
pub use supervisor::{
    DEFAULT_DRAIN_TIMEOUT, DEFAULT_TICK, RunSummary, StartReport, Supervisor, SupervisorState,
};
