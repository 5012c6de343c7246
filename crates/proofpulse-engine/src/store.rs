//! File-based LiveStats snapshot, used as the boot-time fallback when the backend is down.
//! Written only after an applied reconciliation, never on simulation ticks.

use std::path::{Path, PathBuf};

use proofpulse_core::{LiveStats, Result};

pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self, stats: &LiveStats) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(stats)?;
        std::fs::write(&self.path, json)?;
        tracing::debug!("💾 Saved stats snapshot to {}", self.path.display());
        Ok(())
    }

    /// Load the last snapshot. Missing or unreadable files yield `None`.
    pub fn load(&self) -> Option<LiveStats> {
        if !self.path.exists() {
            return None;
        }
        match std::fs::read_to_string(&self.path) {
            Ok(json) => match serde_json::from_str::<LiveStats>(&json) {
                Ok(stats) => Some(stats.clamp()),
                Err(e) => {
                    tracing::warn!("⚠️ Failed to parse stats snapshot: {e}");
                    None
                }
            },
            Err(e) => {
                tracing::warn!("⚠️ Failed to read stats snapshot: {e}");
                None
            }
        }
    }
}
