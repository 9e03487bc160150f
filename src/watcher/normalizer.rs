//! Normalization of raw notifications into [`ChangeEvent`]s.
//!
//! Editors and the OS both report a single logical change as several
//! notifications. The normalizer maps each native class to a canonical kind,
//! pairs the two halves of a rename, and coalesces bursts of modifications to
//! the same path into one event.
//!
//! Ordering: events leave in the order their first notification arrived. A
//! pending (coalescing) modification is flushed before any later
//! non-modification event is emitted, and coalescing windows are fixed from
//! the first notification, so ready entries always form a prefix of the queue.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use indexmap::IndexMap;

use crate::types::{ChangeEvent, ChangeKind};

use super::event::{RawEvent, RawKind};

/// How long an unpaired rename half waits for its partner.
pub const DEFAULT_RENAME_GRACE: Duration = Duration::from_millis(50);

/// Normalizer policy.
#[derive(Debug, Clone)]
pub struct NormalizerConfig {
    /// Window in which modifications of the same path collapse. Zero disables coalescing.
    pub coalesce_window: Duration,
    /// Drop modification notifications for directories (their mtime changes with every child).
    pub ignore_directory_modifications: bool,
    pub rename_grace: Duration,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            coalesce_window: Duration::ZERO,
            ignore_directory_modifications: true,
            rename_grace: DEFAULT_RENAME_GRACE,
        }
    }
}

impl NormalizerConfig {
    pub fn with_coalesce_window(mut self, window: Duration) -> Self {
        self.coalesce_window = window;
        self
    }
}

/// Counters for a normalizer's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NormalizerStats {
    pub received: u64,
    pub emitted: u64,
    pub coalesced: u64,
    pub dropped: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CoalesceKey {
    path: PathBuf,
    kind: ChangeKind,
    is_directory: bool,
}

#[derive(Debug)]
struct Pending {
    event: ChangeEvent,
    first_seen: Instant,
}

#[derive(Debug)]
struct PendingRename {
    from: RawEvent,
    to: Option<RawEvent>,
    seen: Instant,
}

/// Turns raw notifications into canonical change events.
#[derive(Debug)]
pub struct Normalizer {
    config: NormalizerConfig,
    /// Coalescing modifications in arrival order.
    pending: IndexMap<CoalesceKey, Pending>,
    rename: Option<PendingRename>,
    stats: NormalizerStats,
}

impl Normalizer {
    pub fn new(config: NormalizerConfig) -> Self {
        Self {
            config,
            pending: IndexMap::new(),
            rename: None,
            stats: NormalizerStats::default(),
        }
    }

    /// Feed one raw event observed at `now`.
    ///
    /// Returns the events that became final because of it (possibly none).
    pub fn push(&mut self, raw: RawEvent, now: Instant) -> Vec<ChangeEvent> {
        self.stats.received += 1;
        let mut out = Vec::new();

        if self.rename.is_some() && !self.completes_rename(&raw) {
            self.resolve_rename(&mut out);
        }

        let Some(path) = raw.primary_path().cloned() else {
            self.stats.dropped += 1;
            return out;
        };

        match raw.kind {
            RawKind::Accessed | RawKind::Other => {
                self.stats.dropped += 1;
                crate::debug_event!("normalizer", "ignored", "{:?} {}", raw.kind, path.display());
            }
            RawKind::Created => {
                self.flush_pending(&mut out);
                let is_dir = resolve_is_dir(&raw, &path);
                out.push(ChangeEvent::created(path, raw.observed_at, is_dir));
            }
            RawKind::Removed => {
                self.flush_pending(&mut out);
                // Metadata is gone by now; only the backend hint can tell
                let is_dir = raw.dir_hint.unwrap_or(false);
                out.push(ChangeEvent::deleted(path, raw.observed_at, is_dir));
            }
            RawKind::Modified => {
                let is_dir = resolve_is_dir(&raw, &path);
                if is_dir && self.config.ignore_directory_modifications {
                    self.stats.dropped += 1;
                    crate::debug_event!("normalizer", "directory modify ignored", "{}", path.display());
                } else {
                    let event = ChangeEvent::modified(path, raw.observed_at, is_dir);
                    self.coalesce(event, now, &mut out);
                }
            }
            RawKind::RenameBoth => {
                self.flush_pending(&mut out);
                // Any pending half belongs to this rename
                self.rename = None;
                let to = raw.paths.get(1).cloned().unwrap_or_else(|| path.clone());
                let is_dir = resolve_is_dir(&raw, &to);
                out.push(ChangeEvent::moved(path, to, raw.observed_at, is_dir));
            }
            RawKind::RenameFrom => {
                self.flush_pending(&mut out);
                self.rename = Some(PendingRename {
                    from: raw,
                    to: None,
                    seen: now,
                });
            }
            RawKind::RenameTo => match self.rename.as_mut() {
                Some(pending) if pending.to.is_none() && pending.from.tracker == raw.tracker => {
                    // Wait for a combined notification or resolve on the next event
                    pending.to = Some(raw);
                    pending.seen = now;
                }
                _ => {
                    self.resolve_rename(&mut out);
                    self.flush_pending(&mut out);
                    // Moved in from outside the watched tree
                    let is_dir = resolve_is_dir(&raw, &path);
                    out.push(ChangeEvent::created(path, raw.observed_at, is_dir));
                }
            },
            RawKind::RenameAny => {
                self.flush_pending(&mut out);
                let is_dir = resolve_is_dir(&raw, &path);
                if path_exists(&path) {
                    out.push(ChangeEvent::created(path, raw.observed_at, is_dir));
                } else {
                    out.push(ChangeEvent::deleted(path, raw.observed_at, is_dir));
                }
            }
        }

        self.stats.emitted += out.len() as u64;
        out
    }

    /// Take events whose coalescing window (or rename grace) has elapsed.
    pub fn take_ready(&mut self, now: Instant) -> Vec<ChangeEvent> {
        let mut ready = Vec::new();

        if let Some(pending) = &self.rename {
            if now.saturating_duration_since(pending.seen) >= self.config.rename_grace {
                self.resolve_rename(&mut ready);
            }
        }

        let window = self.config.coalesce_window;
        let expired = self
            .pending
            .values()
            .take_while(|p| now.saturating_duration_since(p.first_seen) >= window)
            .count();
        ready.extend(self.pending.drain(..expired).map(|(_, p)| p.event));

        self.stats.emitted += ready.len() as u64;
        ready
    }

    /// Emit everything still held, regardless of windows. Used on shutdown.
    pub fn flush(&mut self) -> Vec<ChangeEvent> {
        let mut out = Vec::new();
        self.resolve_rename(&mut out);
        self.flush_pending(&mut out);
        self.stats.emitted += out.len() as u64;
        out
    }

    /// Check if any events are being held back.
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty() || self.rename.is_some()
    }

    /// Get the number of held events.
    pub fn pending_count(&self) -> usize {
        self.pending.len() + usize::from(self.rename.is_some())
    }

    pub fn stats(&self) -> NormalizerStats {
        self.stats
    }

    pub fn config(&self) -> &NormalizerConfig {
        &self.config
    }

    fn coalesce(&mut self, event: ChangeEvent, now: Instant, out: &mut Vec<ChangeEvent>) {
        let window = self.config.coalesce_window;
        if window.is_zero() {
            out.push(event);
            return;
        }

        let key = CoalesceKey {
            path: event.path().to_path_buf(),
            kind: event.kind(),
            is_directory: event.is_directory(),
        };

        match self.pending.get_index_of(&key) {
            Some(index) => {
                let within = self
                    .pending
                    .get_index(index)
                    .is_some_and(|(_, p)| now.saturating_duration_since(p.first_seen) < window);

                if within {
                    if let Some((_, p)) = self.pending.get_index_mut(index) {
                        p.event = p.event.clone().restamped(event.occurred_at());
                        self.stats.coalesced += 1;
                    }
                } else {
                    // Window over: release everything up to and including the old entry
                    out.extend(self.pending.drain(..=index).map(|(_, p)| p.event));
                    self.pending.insert(
                        key,
                        Pending {
                            event,
                            first_seen: now,
                        },
                    );
                }
            }
            None => {
                self.pending.insert(
                    key,
                    Pending {
                        event,
                        first_seen: now,
                    },
                );
            }
        }
    }

    fn flush_pending(&mut self, out: &mut Vec<ChangeEvent>) {
        out.extend(self.pending.drain(..).map(|(_, p)| p.event));
    }

    fn completes_rename(&self, raw: &RawEvent) -> bool {
        let Some(pending) = &self.rename else {
            return false;
        };
        match raw.kind {
            RawKind::RenameTo => pending.to.is_none() && pending.from.tracker == raw.tracker,
            RawKind::RenameBoth => pending.from.tracker == raw.tracker,
            _ => false,
        }
    }

    fn resolve_rename(&mut self, out: &mut Vec<ChangeEvent>) {
        let Some(PendingRename { from, to, .. }) = self.rename.take() else {
            return;
        };
        let Some(from_path) = from.primary_path().cloned() else {
            return;
        };

        match to.and_then(|to| to.primary_path().cloned().map(|p| (p, to.observed_at))) {
            Some((to_path, observed_at)) => {
                let is_dir = resolve_is_dir(&from, &to_path);
                out.push(ChangeEvent::moved(from_path, to_path, observed_at, is_dir));
            }
            None => {
                // Moved out of the watched tree
                let is_dir = from.dir_hint.unwrap_or(false);
                out.push(ChangeEvent::deleted(from_path, from.observed_at, is_dir));
            }
        }
    }
}

/// Best-effort directory check. A path that vanished before its metadata
/// could be read is reported as a file.
fn resolve_is_dir(raw: &RawEvent, path: &Path) -> bool {
    if let Some(hint) = raw.dir_hint {
        return hint;
    }
    match std::fs::symlink_metadata(path) {
        Ok(meta) => meta.is_dir(),
        Err(e) => {
            crate::debug_event!("normalizer", "metadata unavailable", "{}: {e}", path.display());
            false
        }
    }
}

fn path_exists(path: &Path) -> bool {
    std::fs::symlink_metadata(path).is_ok()
}
