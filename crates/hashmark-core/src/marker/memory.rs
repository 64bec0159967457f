//! In-memory marker store: the test double, also usable for embedding.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::{MarkerStore, MarkerStoreError};

/// Marker store that lives and dies with the process.
#[derive(Default)]
pub struct MemoryMarkerStore {
    markers: Mutex<HashMap<PathBuf, BTreeSet<String>>>,
    writes: AtomicUsize,
}

impl MemoryMarkerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of mutating calls accepted so far. Lets callers assert that a
    /// skipped validation really wrote nothing.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }
}

impl MarkerStore for MemoryMarkerStore {
    fn get_markers(&self, path: &Path) -> Result<BTreeSet<String>, MarkerStoreError> {
        Ok(self
            .markers
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .unwrap_or_default())
    }

    fn set_marker(&self, path: &Path, marker: &str) -> Result<(), MarkerStoreError> {
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.markers
            .lock()
            .unwrap()
            .entry(path.to_path_buf())
            .or_default()
            .insert(marker.to_string());
        Ok(())
    }

    fn remove_marker(&self, path: &Path, marker: &str) -> Result<(), MarkerStoreError> {
        self.writes.fetch_add(1, Ordering::Relaxed);
        if let Some(set) = self.markers.lock().unwrap().get_mut(path) {
            set.remove(marker);
        }
        Ok(())
    }
}
