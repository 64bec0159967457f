//! Manifest dispatch: resolve listed targets and fan validations out.
//!
//! One dispatch is triggered per "manifest needs refresh" event. The
//! manifest is re-read from disk each time, its entries resolved against
//! the containing folder, and qualifying targets run through the engine
//! concurrently on a bounded pool of blocking tasks.

use anyhow::{Context, Result};
use std::path::{Component, Path};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinSet;

use crate::digest::Algorithm;
use crate::engine::{Outcome, TargetRecord, ValidationEngine};
use crate::manifest;

/// Tally of one manifest dispatch.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DispatchSummary {
    /// Well-formed entries found in the manifest.
    pub entries: usize,
    /// Entries rejected because their name escapes the manifest's folder.
    pub rejected: usize,
    /// Listed targets absent on disk.
    pub missing: usize,
    pub matched: usize,
    pub mismatched: usize,
    /// Targets skipped as already marked or duplicate.
    pub skipped: usize,
    pub read_errors: usize,
}

/// Fans manifest targets out to the engine, at most `max_concurrent`
/// digests in flight at a time.
pub struct Dispatcher {
    engine: Arc<ValidationEngine>,
    max_concurrent: usize,
    force_revalidate: bool,
    shutdown: Arc<AtomicBool>,
}

impl Dispatcher {
    /// `force_revalidate` makes every dispatch re-verdict targets that
    /// already carry a marker, so a changed manifest takes effect without
    /// an external marker sweep.
    pub fn new(engine: Arc<ValidationEngine>, max_concurrent: usize, force_revalidate: bool) -> Self {
        Self {
            engine,
            max_concurrent: max_concurrent.max(1),
            force_revalidate,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Engine this dispatcher submits to.
    pub fn engine(&self) -> &Arc<ValidationEngine> {
        &self.engine
    }

    /// Request shutdown: running dispatches stop admitting new targets,
    /// drain their in-flight digests, and return. Idempotent.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    /// Re-read `manifest_path` and validate every target it lists.
    ///
    /// Targets run independently and in no particular order. An
    /// unrecognized manifest extension yields an empty summary; an
    /// unreadable manifest aborts the dispatch with no target touched.
    pub async fn dispatch(&self, manifest_path: &Path) -> Result<DispatchSummary> {
        let mut summary = DispatchSummary::default();

        let Some(algorithm) = Algorithm::from_manifest_path(manifest_path) else {
            tracing::debug!(path = %manifest_path.display(), "unsupported manifest extension, skipping");
            return Ok(summary);
        };

        let folder = manifest_path
            .parent()
            .context("manifest has no containing folder")?
            .to_path_buf();

        // Re-read on every dispatch so a changed manifest is never served stale.
        let text = std::fs::read_to_string(manifest_path)
            .with_context(|| format!("read manifest {}", manifest_path.display()))?;
        let entries = manifest::parse(&text);
        summary.entries = entries.len();

        let mut join_set: JoinSet<Outcome> = JoinSet::new();
        for entry in entries {
            if self.shutdown.load(Ordering::Relaxed) {
                tracing::debug!(path = %manifest_path.display(), "shutdown requested, stopping dispatch");
                break;
            }
            if !is_safe_target_name(&entry.target_name) {
                tracing::warn!(name = %entry.target_name, "rejecting manifest entry that escapes its folder");
                summary.rejected += 1;
                continue;
            }
            let absolute_path = folder.join(&entry.target_name);
            if !absolute_path.is_file() {
                tracing::debug!(path = %absolute_path.display(), "listed target missing, skipping");
                summary.missing += 1;
                continue;
            }

            while join_set.len() >= self.max_concurrent {
                let Some(res) = join_set.join_next().await else {
                    break;
                };
                let outcome = res.map_err(|e| anyhow::anyhow!("validation task join: {}", e))?;
                tally(&mut summary, outcome);
            }

            let target = TargetRecord {
                absolute_path,
                expected_hash: entry.expected_hash,
                algorithm,
                containing_folder: folder.clone(),
            };
            let engine = Arc::clone(&self.engine);
            let force = self.force_revalidate;
            join_set.spawn_blocking(move || engine.validate(&target, force));
        }

        while let Some(res) = join_set.join_next().await {
            let outcome = res.map_err(|e| anyhow::anyhow!("validation task join: {}", e))?;
            tally(&mut summary, outcome);
        }

        tracing::info!(
            path = %manifest_path.display(),
            entries = summary.entries,
            matched = summary.matched,
            mismatched = summary.mismatched,
            skipped = summary.skipped,
            "manifest dispatch complete"
        );
        Ok(summary)
    }
}

fn tally(summary: &mut DispatchSummary, outcome: Outcome) {
    match outcome {
        Outcome::Match => summary.matched += 1,
        Outcome::Mismatch => summary.mismatched += 1,
        Outcome::SkippedAlreadyMarked | Outcome::SkippedDuplicate => summary.skipped += 1,
        Outcome::ReadError => summary.read_errors += 1,
    }
}

/// A manifest may only name files under its own folder: every component
/// must be a normal name, which excludes absolute paths, `..` escapes, and
/// `.` segments.
fn is_safe_target_name(name: &str) -> bool {
    if name.is_empty() {
        return false;
    }
    Path::new(name)
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
}
