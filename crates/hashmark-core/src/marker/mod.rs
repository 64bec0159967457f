//! Emblem marker persistence.
//!
//! Validation verdicts are persisted as string labels ("emblems") attached
//! to a file path in an external attribute store, which is the only durable
//! state this crate depends on. The store may carry unrelated labels set by
//! other tools; this crate only ever adds or removes the two labels it owns
//! and must leave the rest untouched.

mod gio;
mod memory;

pub use gio::{GioMarkerStore, EMBLEM_ATTRIBUTE};
pub use memory::MemoryMarkerStore;

use std::collections::BTreeSet;
use std::path::Path;
use thiserror::Error;

/// Label applied when a target's digest matches its manifest entry.
pub const VERIFIED_MARKER: &str = "emblem-hash-verified";
/// Label applied when the digest does not match.
pub const MISMATCH_MARKER: &str = "emblem-hash-error";

/// Failure talking to the external marker store (path vanished, attribute
/// tool unavailable or unhappy).
#[derive(Debug, Error)]
pub enum MarkerStoreError {
    #[error("marker store I/O: {0}")]
    Io(#[from] std::io::Error),
    #[error("marker tool exited with status {status}: {stderr}")]
    Tool { status: i32, stderr: String },
}

/// Adapter over the per-path attribute store.
///
/// `set_marker` is idempotent and merges with whatever labels are already
/// present; `remove_marker` removes only the named label. Calls may shell
/// out to another process, so latency is non-trivial; never invoke these
/// while holding a lock.
pub trait MarkerStore: Send + Sync {
    fn get_markers(&self, path: &Path) -> Result<BTreeSet<String>, MarkerStoreError>;
    fn set_marker(&self, path: &Path, marker: &str) -> Result<(), MarkerStoreError>;
    fn remove_marker(&self, path: &Path, marker: &str) -> Result<(), MarkerStoreError>;
}

/// True when the path already carries a verdict label this crate owns.
/// A store read failure reads as "no markers" so validation can proceed.
pub fn has_owned_marker(store: &dyn MarkerStore, path: &Path) -> bool {
    match store.get_markers(path) {
        Ok(markers) => {
            markers.contains(VERIFIED_MARKER) || markers.contains(MISMATCH_MARKER)
        }
        Err(err) => {
            tracing::debug!(path = %path.display(), error = %err, "marker read failed, assuming none");
            false
        }
    }
}
