//! Host-facing evaluation entry point.
//!
//! The file browser calls in for every path it displays and needs an
//! answer immediately, so anything that hashes is deferred to a background
//! task and the host is told "in progress". Each deferred evaluation is
//! followed by exactly one completion notice on the updates channel, which
//! the host bridges to its own notification mechanism.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::digest::Algorithm;
use crate::dispatch::{DispatchSummary, Dispatcher};
use crate::engine::{Outcome, TargetRecord, ValidationEngine};
use crate::manifest;

/// Immediate answer to a host refresh request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluationStatus {
    /// Nothing was deferred; the host needs no follow-up.
    Complete,
    /// Work was queued; an `EvaluationUpdate` will follow on the channel.
    InProgress,
}

/// Completion notice for a deferred evaluation.
#[derive(Debug)]
pub enum EvaluationUpdate {
    /// A plain file finished validating against its sibling manifest.
    Target { path: PathBuf, outcome: Outcome },
    /// A manifest finished dispatching its listed targets.
    Manifest {
        path: PathBuf,
        summary: DispatchSummary,
    },
    /// The deferred work failed, e.g. the manifest became unreadable.
    Failed { path: PathBuf, error: String },
}

/// Per-path evaluation entry point the host's callback glue invokes.
///
/// Must be called from within a tokio runtime; deferred work is spawned
/// onto it and digests run on the blocking pool, never on the caller.
pub struct FileInfoProvider {
    dispatcher: Arc<Dispatcher>,
    updates: mpsc::Sender<EvaluationUpdate>,
}

impl FileInfoProvider {
    pub fn new(dispatcher: Arc<Dispatcher>, updates: mpsc::Sender<EvaluationUpdate>) -> Self {
        Self {
            dispatcher,
            updates,
        }
    }

    /// Handle one "file info needs refresh" event from the host.
    ///
    /// Directories and vanished paths are complete immediately. A manifest
    /// defers a dispatch of its targets (the manifest itself is never
    /// badged). A plain file defers a validation when a sibling manifest
    /// lists it, and is complete otherwise.
    pub fn evaluate(&self, path: &Path) -> EvaluationStatus {
        if !path.is_file() {
            return EvaluationStatus::Complete;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return EvaluationStatus::Complete;
        };

        if manifest::is_manifest_name(name) {
            let dispatcher = Arc::clone(&self.dispatcher);
            let updates = self.updates.clone();
            let manifest_path = path.to_path_buf();
            tokio::spawn(async move {
                let update = match dispatcher.dispatch(&manifest_path).await {
                    Ok(summary) => EvaluationUpdate::Manifest {
                        path: manifest_path,
                        summary,
                    },
                    Err(err) => {
                        tracing::warn!(path = %manifest_path.display(), error = %format!("{:#}", err), "manifest dispatch failed");
                        EvaluationUpdate::Failed {
                            path: manifest_path,
                            error: format!("{:#}", err),
                        }
                    }
                };
                let _ = updates.send(update).await;
            });
            return EvaluationStatus::InProgress;
        }

        let Some(target) = sibling_manifest_target(path, name) else {
            return EvaluationStatus::Complete;
        };
        let engine: Arc<ValidationEngine> = Arc::clone(self.dispatcher.engine());
        let updates = self.updates.clone();
        let target_path = path.to_path_buf();
        tokio::spawn(async move {
            let update = match tokio::task::spawn_blocking(move || engine.validate(&target, false))
                .await
            {
                Ok(outcome) => EvaluationUpdate::Target {
                    path: target_path,
                    outcome,
                },
                Err(err) => EvaluationUpdate::Failed {
                    path: target_path,
                    error: err.to_string(),
                },
            };
            let _ = updates.send(update).await;
        });
        EvaluationStatus::InProgress
    }
}

/// Look beside the file for a manifest named `<file>.<ext>`, trying each
/// supported extension, and pull out the entry covering this file.
fn sibling_manifest_target(path: &Path, name: &str) -> Option<TargetRecord> {
    let folder = path.parent()?;
    for ext in manifest::MANIFEST_EXTENSIONS {
        let manifest_path = folder.join(format!("{name}{ext}"));
        if !manifest_path.is_file() {
            continue;
        }
        let Some(algorithm) = Algorithm::from_manifest_path(&manifest_path) else {
            continue;
        };
        let text = match std::fs::read_to_string(&manifest_path) {
            Ok(text) => text,
            Err(err) => {
                tracing::warn!(path = %manifest_path.display(), error = %err, "sibling manifest unreadable");
                continue;
            }
        };
        if let Some(entry) = manifest::parse(&text)
            .into_iter()
            .find(|e| e.target_name == name)
        {
            return Some(TargetRecord {
                absolute_path: path.to_path_buf(),
                expected_hash: entry.expected_hash,
                algorithm,
                containing_folder: folder.to_path_buf(),
            });
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marker::{MarkerStore, MemoryMarkerStore, VERIFIED_MARKER};
    use std::io::Write;
    use std::time::Duration;

    const HELLO_SHA256: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";
    const HELLO_MD5: &str = "5d41402abc4b2a76b9719d911017c592";

    fn write_file(dir: &Path, name: &str, contents: &[u8]) -> PathBuf {
        let path = dir.join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(contents).unwrap();
        path
    }

    fn provider(
        store: Arc<MemoryMarkerStore>,
    ) -> (FileInfoProvider, mpsc::Receiver<EvaluationUpdate>) {
        let engine = Arc::new(ValidationEngine::new(store, Duration::ZERO));
        let dispatcher = Arc::new(Dispatcher::new(engine, 4, false));
        let (tx, rx) = mpsc::channel(16);
        (FileInfoProvider::new(dispatcher, tx), rx)
    }

    #[tokio::test]
    async fn manifest_event_dispatches_and_notifies() {
        let dir = tempfile::tempdir().unwrap();
        let target = write_file(dir.path(), "a.txt", b"hello");
        let manifest_path = write_file(
            dir.path(),
            "a.txt.sha256sum",
            format!("{HELLO_SHA256}  a.txt\n").as_bytes(),
        );

        let store = Arc::new(MemoryMarkerStore::new());
        let (p, mut rx) = provider(store.clone());

        assert_eq!(p.evaluate(&manifest_path), EvaluationStatus::InProgress);
        match rx.recv().await.expect("completion notice") {
            EvaluationUpdate::Manifest { path, summary } => {
                assert_eq!(path, manifest_path);
                assert_eq!(summary.matched, 1);
            }
            other => panic!("unexpected update: {:?}", other),
        }

        assert!(store.get_markers(&target).unwrap().contains(VERIFIED_MARKER));
        // The manifest itself is never badged.
        assert!(store.get_markers(&manifest_path).unwrap().is_empty());
    }

    #[tokio::test]
    async fn plain_file_with_sibling_manifest_validates() {
        let dir = tempfile::tempdir().unwrap();
        let target = write_file(dir.path(), "b.txt", b"hello");
        write_file(
            dir.path(),
            "b.txt.md5sum",
            format!("{HELLO_MD5}  b.txt\n").as_bytes(),
        );

        let store = Arc::new(MemoryMarkerStore::new());
        let (p, mut rx) = provider(store.clone());

        assert_eq!(p.evaluate(&target), EvaluationStatus::InProgress);
        match rx.recv().await.expect("completion notice") {
            EvaluationUpdate::Target { path, outcome } => {
                assert_eq!(path, target);
                assert_eq!(outcome, Outcome::Match);
            }
            other => panic!("unexpected update: {:?}", other),
        }
        assert!(store.get_markers(&target).unwrap().contains(VERIFIED_MARKER));
    }

    #[tokio::test]
    async fn uncovered_file_completes_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let lone = write_file(dir.path(), "lone.txt", b"hello");

        let store = Arc::new(MemoryMarkerStore::new());
        let (p, _rx) = provider(store.clone());

        assert_eq!(p.evaluate(&lone), EvaluationStatus::Complete);
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn directories_and_missing_paths_complete_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryMarkerStore::new());
        let (p, _rx) = provider(store);

        assert_eq!(p.evaluate(dir.path()), EvaluationStatus::Complete);
        assert_eq!(
            p.evaluate(&dir.path().join("nope.txt")),
            EvaluationStatus::Complete
        );
    }

    #[tokio::test]
    async fn unreadable_manifest_reports_failure() {
        let dir = tempfile::tempdir().unwrap();
        let manifest_path = write_file(dir.path(), "a.txt.sha256sum", b"");
        let store = Arc::new(MemoryMarkerStore::new());
        let (p, mut rx) = provider(store);

        assert_eq!(p.evaluate(&manifest_path), EvaluationStatus::InProgress);
        std::fs::remove_file(&manifest_path).unwrap();

        match rx.recv().await.expect("completion notice") {
            // Either the dispatch read the manifest before the delete (zero
            // entries) or after it (failure); both are terminal notices.
            EvaluationUpdate::Manifest { summary, .. } => assert_eq!(summary.entries, 0),
            EvaluationUpdate::Failed { path, .. } => assert_eq!(path, manifest_path),
            other => panic!("unexpected update: {:?}", other),
        }
    }

    #[test]
    fn sibling_lookup_picks_the_entry_for_this_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = write_file(dir.path(), "b.txt", b"hello");
        write_file(
            dir.path(),
            "b.txt.sha256sum",
            format!("aaaa  other.txt\n{HELLO_SHA256}  b.txt\n").as_bytes(),
        );

        let record = sibling_manifest_target(&target, "b.txt").expect("entry found");
        assert_eq!(record.expected_hash, HELLO_SHA256);
        assert_eq!(record.algorithm, Algorithm::Sha256);
        assert_eq!(record.absolute_path, target);
    }

    #[test]
    fn sibling_lookup_without_manifest_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let target = write_file(dir.path(), "b.txt", b"hello");
        assert!(sibling_manifest_target(&target, "b.txt").is_none());
    }
}
