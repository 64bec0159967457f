//! Validation cache and de-duplication.
//!
//! The file browser fires bursts of refresh events for the same path, one
//! per attribute it queries, and several manifests can cover the same file.
//! Admission goes through a single lock covering both the in-flight flag
//! and the completion timestamp for a path, so at most one digest runs per
//! path at a time and a completed run suppresses re-runs for the cache
//! window. The lock protects only that read-then-write; digest computation
//! and marker I/O happen outside it, and different paths never block each
//! other.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Per-path validation state. Entries are created lazily on the first
/// attempt and never evicted.
#[derive(Debug, Default)]
struct PathState {
    in_progress: bool,
    last_validated_at: Option<Instant>,
}

/// Admission tracker shared by all validations of one engine.
#[derive(Debug)]
pub struct ValidationTracker {
    window: Duration,
    states: Mutex<HashMap<PathBuf, PathState>>,
}

impl ValidationTracker {
    /// A zero window disables completion-time suppression (useful for
    /// forced re-scans and tests); de-duplication of in-flight attempts
    /// still applies.
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            states: Mutex::new(HashMap::new()),
        }
    }

    /// Try to admit a validation of `path`.
    ///
    /// Refused when another attempt is in flight or one completed within
    /// the cache window; refusal is the normal "someone else is handling
    /// it" outcome, not an error. The returned ticket releases the slot on
    /// drop whatever the exit path, so a failed or panicking validation
    /// cannot wedge the entry.
    pub fn try_begin(&self, path: &Path) -> Option<ValidationTicket<'_>> {
        let mut states = self.states.lock().unwrap();
        let state = states.entry(path.to_path_buf()).or_default();
        if state.in_progress {
            return None;
        }
        if let Some(at) = state.last_validated_at {
            if at.elapsed() < self.window {
                return None;
            }
        }
        state.in_progress = true;
        Some(ValidationTicket {
            tracker: self,
            path: path.to_path_buf(),
            succeeded: false,
        })
    }

    /// True when an attempt for `path` is currently admitted.
    pub fn is_in_progress(&self, path: &Path) -> bool {
        self.states
            .lock()
            .unwrap()
            .get(path)
            .map(|s| s.in_progress)
            .unwrap_or(false)
    }

    fn end(&self, path: &Path, succeeded: bool) {
        let mut states = self.states.lock().unwrap();
        if let Some(state) = states.get_mut(path) {
            state.in_progress = false;
            if succeeded {
                state.last_validated_at = Some(Instant::now());
            }
        }
    }
}

/// Admission slot for one validation attempt. Dropping it without
/// `complete` releases the slot with no timestamp, so a retry is allowed
/// immediately.
pub struct ValidationTicket<'a> {
    tracker: &'a ValidationTracker,
    path: PathBuf,
    succeeded: bool,
}

impl ValidationTicket<'_> {
    /// Mark the attempt as ran-to-completion. The cache window then applies
    /// whether the file matched or not, so a known-bad file is not hashed
    /// again on every scan cycle.
    pub fn complete(mut self) {
        self.succeeded = true;
    }
}

impl Drop for ValidationTicket<'_> {
    fn drop(&mut self) {
        self.tracker.end(&self.path, self.succeeded);
    }
}
