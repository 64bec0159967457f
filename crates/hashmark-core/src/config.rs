use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Global configuration loaded from `~/.config/hashmark/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HashmarkConfig {
    /// Seconds a completed validation suppresses re-validation of the same
    /// path. The host fires repeated refresh events in quick succession;
    /// without suppression the same digest would be recomputed many times
    /// per second for an unchanged file.
    pub cache_window_secs: u64,
    /// Maximum digests computed concurrently per manifest dispatch.
    pub max_concurrent_validations: usize,
    /// Re-verdict targets that already carry a marker whenever their
    /// manifest is re-dispatched. Off by default: the durable marker wins
    /// over a routine re-scan.
    #[serde(default)]
    pub revalidate_on_manifest_change: bool,
}

impl Default for HashmarkConfig {
    fn default() -> Self {
        Self {
            cache_window_secs: 10,
            max_concurrent_validations: 8,
            revalidate_on_manifest_change: false,
        }
    }
}

impl HashmarkConfig {
    pub fn cache_window(&self) -> Duration {
        Duration::from_secs(self.cache_window_secs)
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("hashmark")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<HashmarkConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = HashmarkConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: HashmarkConfig = toml::from_str(&data)?;
    Ok(cfg)
}
