//! Validation engine: digest a target, compare against its manifest entry,
//! and converge the persisted marker to the verdict.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::digest::Algorithm;
use crate::marker::{MarkerStore, MISMATCH_MARKER, VERIFIED_MARKER};
use crate::tracker::ValidationTracker;

/// Unit of work: one manifest entry resolved to an absolute target path.
#[derive(Debug, Clone)]
pub struct TargetRecord {
    pub absolute_path: PathBuf,
    pub expected_hash: String,
    pub algorithm: Algorithm,
    pub containing_folder: PathBuf,
}

/// Result of one validation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Digest matched; the verified marker is in place.
    Match,
    /// Digest differed; the mismatch marker is in place.
    Mismatch,
    /// The path already carries one of our verdict markers; nothing was
    /// recomputed and the admission tracker was not touched.
    SkippedAlreadyMarked,
    /// Another attempt is in flight, or one completed within the cache
    /// window. Dropped, not queued; a later scan picks the path up again.
    SkippedDuplicate,
    /// The target could not be read; no marker applied either way.
    ReadError,
}

/// Ties the digest registry, marker store, and admission tracker together.
/// Each engine owns its tracker, so independent engines share no state.
pub struct ValidationEngine {
    markers: Arc<dyn MarkerStore>,
    tracker: ValidationTracker,
}

impl ValidationEngine {
    pub fn new(markers: Arc<dyn MarkerStore>, cache_window: Duration) -> Self {
        Self {
            markers,
            tracker: ValidationTracker::new(cache_window),
        }
    }

    /// Shared handle to the marker store this engine reconciles against.
    pub fn marker_store(&self) -> &Arc<dyn MarkerStore> {
        &self.markers
    }

    /// Validate one target and converge its marker to the result.
    ///
    /// A path already bearing a verdict marker is skipped: markers outlive
    /// the process while the in-memory cache does not, so the durable
    /// verdict wins on a routine re-scan. `force_revalidate` ignores the
    /// existing verdict and replaces it (the admission check still
    /// applies). Blocks on file reads and marker I/O.
    pub fn validate(&self, target: &TargetRecord, force_revalidate: bool) -> Outcome {
        let path = target.absolute_path.as_path();

        let existing: BTreeSet<String> = match self.markers.get_markers(path) {
            Ok(markers) => markers,
            Err(err) => {
                tracing::debug!(path = %path.display(), error = %err, "marker read failed, assuming none");
                BTreeSet::new()
            }
        };
        let already_marked =
            existing.contains(VERIFIED_MARKER) || existing.contains(MISMATCH_MARKER);
        if already_marked && !force_revalidate {
            tracing::debug!(path = %path.display(), "verdict marker present, skipping");
            return Outcome::SkippedAlreadyMarked;
        }

        let Some(ticket) = self.tracker.try_begin(path) else {
            tracing::debug!(path = %path.display(), "validation in flight or recent, skipping");
            return Outcome::SkippedDuplicate;
        };

        let actual = match target.algorithm.digest_path(path) {
            Ok(digest) => digest,
            Err(err) => {
                // Ticket drops not-succeeded: an unreadable target must not
                // look like a mismatch, and a retry is allowed right away.
                tracing::warn!(path = %path.display(), error = %err, "target unreadable, leaving unmarked");
                return Outcome::ReadError;
            }
        };

        let (outcome, verdict, stale) = if actual.eq_ignore_ascii_case(&target.expected_hash) {
            (Outcome::Match, VERIFIED_MARKER, MISMATCH_MARKER)
        } else {
            (Outcome::Mismatch, MISMATCH_MARKER, VERIFIED_MARKER)
        };

        // Marker writes are best-effort: the verdict stands even when the
        // external store cannot persist it.
        if let Err(err) = self.markers.set_marker(path, verdict) {
            tracing::warn!(path = %path.display(), marker = verdict, error = %err, "marker write failed");
        }
        if existing.contains(stale) {
            if let Err(err) = self.markers.remove_marker(path, stale) {
                tracing::warn!(path = %path.display(), marker = stale, error = %err, "stale marker removal failed");
            }
        }

        ticket.complete();

        match outcome {
            Outcome::Match => {
                tracing::info!(path = %path.display(), algorithm = target.algorithm.name(), "checksum verified");
            }
            Outcome::Mismatch => {
                tracing::warn!(path = %path.display(), algorithm = target.algorithm.name(), "checksum mismatch");
            }
            _ => {}
        }
        outcome
    }
}
