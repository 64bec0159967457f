//! Marker store backed by the `gio` attribute tool.
//!
//! The file browser persists emblems in the `metadata::emblems` string-list
//! attribute of its metadata store. This adapter drives the same store
//! through the `gio` command so markers survive restarts and show up in the
//! browser UI.

use std::collections::BTreeSet;
use std::path::Path;
use std::process::Command;

use super::{MarkerStore, MarkerStoreError};

/// Attribute holding the emblem label list.
pub const EMBLEM_ATTRIBUTE: &str = "metadata::emblems";

/// Production adapter. Each call spawns a short-lived `gio` process, so
/// expect tens of milliseconds per operation.
#[derive(Debug, Clone, Default)]
pub struct GioMarkerStore;

impl GioMarkerStore {
    pub fn new() -> Self {
        Self
    }

    fn read_markers(&self, path: &Path) -> Result<BTreeSet<String>, MarkerStoreError> {
        let output = Command::new("gio")
            .args(["info", "-a", EMBLEM_ATTRIBUTE])
            .arg(path)
            .output()?;
        if !output.status.success() {
            return Err(tool_error(&output));
        }
        Ok(parse_emblem_attribute(&String::from_utf8_lossy(
            &output.stdout,
        )))
    }

    fn write_markers(&self, path: &Path, markers: &BTreeSet<String>) -> Result<(), MarkerStoreError> {
        let mut cmd = Command::new("gio");
        if markers.is_empty() {
            // `-t stringv` requires at least one value; clear the attribute instead.
            cmd.args(["set", "-t", "unset"]).arg(path).arg(EMBLEM_ATTRIBUTE);
        } else {
            cmd.args(["set", "-t", "stringv"]).arg(path).arg(EMBLEM_ATTRIBUTE);
            for marker in markers {
                cmd.arg(marker);
            }
        }
        let output = cmd.output()?;
        if !output.status.success() {
            return Err(tool_error(&output));
        }
        Ok(())
    }
}

fn tool_error(output: &std::process::Output) -> MarkerStoreError {
    MarkerStoreError::Tool {
        status: output.status.code().unwrap_or(-1),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    }
}

/// Extract label values from `gio info` output; the attribute line looks
/// like `  metadata::emblems: [emblem-a, emblem-b]`.
fn parse_emblem_attribute(stdout: &str) -> BTreeSet<String> {
    let mut markers = BTreeSet::new();
    for line in stdout.lines() {
        let line = line.trim();
        let Some(rest) = line.strip_prefix(EMBLEM_ATTRIBUTE) else {
            continue;
        };
        let Some(value) = rest.strip_prefix(':') else {
            continue;
        };
        let value = value.trim().trim_start_matches('[').trim_end_matches(']');
        for item in value.split(',') {
            let item = item.trim();
            if !item.is_empty() {
                markers.insert(item.to_string());
            }
        }
    }
    markers
}

impl MarkerStore for GioMarkerStore {
    fn get_markers(&self, path: &Path) -> Result<BTreeSet<String>, MarkerStoreError> {
        self.read_markers(path)
    }

    fn set_marker(&self, path: &Path, marker: &str) -> Result<(), MarkerStoreError> {
        let mut markers = self.read_markers(path)?;
        if !markers.insert(marker.to_string()) {
            return Ok(());
        }
        self.write_markers(path, &markers)
    }

    fn remove_marker(&self, path: &Path, marker: &str) -> Result<(), MarkerStoreError> {
        let mut markers = self.read_markers(path)?;
        if !markers.remove(marker) {
            return Ok(());
        }
        self.write_markers(path, &markers)
    }
}
