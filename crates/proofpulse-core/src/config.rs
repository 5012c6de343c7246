//! ProofPulse configuration system.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ProofPulseError, Result};
use crate::types::{Priority, ProofType};

/// Root configuration file (`~/.proofpulse/config.toml`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProofPulseConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub snapshot: SnapshotConfig,
}

impl ProofPulseConfig {
    /// Load config from the default path, falling back to defaults.
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ProofPulseError::Config(format!("Failed to read config: {e}")))?;
        Self::parse(&content)
    }

    /// Parse config from TOML text.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| ProofPulseError::Config(format!("Failed to parse config: {e}")))
    }

    /// Save config to the default path.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::default_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| ProofPulseError::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the ProofPulse home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".proofpulse")
    }
}

/// Where the host renders the notification card. Stored, never interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Position {
    #[default]
    BottomLeft,
    BottomRight,
    TopLeft,
    TopRight,
}

/// Runtime engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "bool_true")]
    pub enabled: bool,
    /// How long an item stays current (ms).
    #[serde(default = "default_display_duration")]
    pub display_duration_ms: u64,
    /// Gap between promotion attempts (ms).
    #[serde(default = "default_display_interval")]
    pub display_interval_ms: u64,
    #[serde(default = "default_max_queue")]
    pub max_queue: usize,
    #[serde(default)]
    pub position: Position,
    /// Gates `signup` and `referral`.
    #[serde(default = "bool_true")]
    pub show_signups: bool,
    /// Gates `purchase`.
    #[serde(default = "bool_true")]
    pub show_purchases: bool,
    /// Gates `achievement` and `milestone`.
    #[serde(default = "bool_true")]
    pub show_achievements: bool,
    /// Admitted priorities; empty admits all.
    #[serde(default)]
    pub priority_filter: Vec<Priority>,
    /// Admitted types; empty admits all.
    #[serde(default)]
    pub type_filter: Vec<ProofType>,
}

fn bool_true() -> bool { true }
fn default_display_duration() -> u64 { 5_000 }
fn default_display_interval() -> u64 { 8_000 }
fn default_max_queue() -> usize { 10 }

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            display_duration_ms: default_display_duration(),
            display_interval_ms: default_display_interval(),
            max_queue: default_max_queue(),
            position: Position::default(),
            show_signups: true,
            show_purchases: true,
            show_achievements: true,
            priority_filter: Vec::new(),
            type_filter: Vec::new(),
        }
    }
}

impl EngineConfig {
    pub fn display_duration(&self) -> Duration {
        Duration::from_millis(self.display_duration_ms)
    }

    pub fn display_interval(&self) -> Duration {
        Duration::from_millis(self.display_interval_ms)
    }

    /// Whether the category toggles and `type_filter` let this type through.
    pub fn allows_type(&self, kind: ProofType) -> bool {
        let toggled = match kind {
            ProofType::Signup | ProofType::Referral => self.show_signups,
            ProofType::Purchase => self.show_purchases,
            ProofType::Achievement | ProofType::Milestone => self.show_achievements,
            ProofType::Workflow | ProofType::Review => true,
        };
        toggled && (self.type_filter.is_empty() || self.type_filter.contains(&kind))
    }

    pub fn allows_priority(&self, priority: Priority) -> bool {
        self.priority_filter.is_empty() || self.priority_filter.contains(&priority)
    }

    /// Full admission check for an item entering the queue.
    pub fn admits(&self, kind: ProofType, priority: Priority) -> bool {
        self.allows_type(kind) && self.allows_priority(priority)
    }

    /// Overlay every `Some` field of `patch`.
    pub fn merge(&mut self, patch: &EngineConfigPatch) {
        if let Some(v) = patch.enabled {
            self.enabled = v;
        }
        if let Some(v) = patch.display_duration_ms {
            self.display_duration_ms = v;
        }
        if let Some(v) = patch.display_interval_ms {
            self.display_interval_ms = v;
        }
        if let Some(v) = patch.max_queue {
            self.max_queue = v;
        }
        if let Some(v) = patch.position {
            self.position = v;
        }
        if let Some(v) = patch.show_signups {
            self.show_signups = v;
        }
        if let Some(v) = patch.show_purchases {
            self.show_purchases = v;
        }
        if let Some(v) = patch.show_achievements {
            self.show_achievements = v;
        }
        if let Some(v) = &patch.priority_filter {
            self.priority_filter = v.clone();
        }
        if let Some(v) = &patch.type_filter {
            self.type_filter = v.clone();
        }
    }

    /// Defaults with `patch` applied.
    pub fn from_patch(patch: &EngineConfigPatch) -> Self {
        let mut config = Self::default();
        config.merge(patch);
        config
    }
}

/// Partial engine configuration. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfigPatch {
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub display_duration_ms: Option<u64>,
    #[serde(default)]
    pub display_interval_ms: Option<u64>,
    #[serde(default)]
    pub max_queue: Option<usize>,
    #[serde(default)]
    pub position: Option<Position>,
    #[serde(default)]
    pub show_signups: Option<bool>,
    #[serde(default)]
    pub show_purchases: Option<bool>,
    #[serde(default)]
    pub show_achievements: Option<bool>,
    #[serde(default)]
    pub priority_filter: Option<Vec<Priority>>,
    #[serde(default)]
    pub type_filter: Option<Vec<ProofType>>,
}

impl From<EngineConfig> for EngineConfigPatch {
    fn from(c: EngineConfig) -> Self {
        Self {
            enabled: Some(c.enabled),
            display_duration_ms: Some(c.display_duration_ms),
            display_interval_ms: Some(c.display_interval_ms),
            max_queue: Some(c.max_queue),
            position: Some(c.position),
            show_signups: Some(c.show_signups),
            show_purchases: Some(c.show_purchases),
            show_achievements: Some(c.show_achievements),
            priority_filter: Some(c.priority_filter),
            type_filter: Some(c.type_filter),
        }
    }
}

/// Authoritative stats backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the stats API. Empty = run offline.
    #[serde(default)]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_leaderboard_limit")]
    pub leaderboard_limit: usize,
}

fn default_timeout_secs() -> u64 { 10 }
fn default_leaderboard_limit() -> usize { 5 }

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            timeout_secs: default_timeout_secs(),
            leaderboard_limit: default_leaderboard_limit(),
        }
    }
}

/// Optional LiveStats fallback snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Snapshot file. Empty = `~/.proofpulse/stats.json`.
    #[serde(default)]
    pub path: String,
}

impl SnapshotConfig {
    pub fn resolved_path(&self) -> PathBuf {
        if self.path.is_empty() {
            ProofPulseConfig::home_dir().join("stats.json")
        } else {
            PathBuf::from(&self.path)
        }
    }
}
