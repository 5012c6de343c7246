//! Backend RPC boundary — authoritative stats and leaderboard.
//!
//! Every call returns `Result`; the aggregator decides what a failure means
//! (always "no data"). Implementations must not panic.

use std::time::Duration;

use async_trait::async_trait;
use proofpulse_core::{BackendConfig, ProofPulseError, Result};
use serde::{Deserialize, Serialize};

/// Best-effort metrics snapshot. Absent fields mean "unknown".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSummary {
    #[serde(default)]
    pub active_users: Option<u64>,
    #[serde(default)]
    pub workflows_run: Option<u64>,
}

/// Best-effort analytics overview.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsOverview {
    #[serde(default)]
    pub active_users: Option<u64>,
    #[serde(default)]
    pub signups_today: Option<u64>,
}

/// Ranked leaderboard row. Only `username` and `level` are consumed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub user_id: String,
    pub username: String,
    #[serde(default)]
    pub score: u32,
    #[serde(default)]
    pub rank: u32,
    #[serde(default)]
    pub level: u32,
}

/// Authoritative data source consumed by the stats aggregator.
#[async_trait]
pub trait StatsBackend: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &str;

    async fn metrics_summary(&self) -> Result<MetricsSummary>;

    async fn analytics_overview(&self) -> Result<AnalyticsOverview>;

    async fn leaderboard(&self, limit: usize) -> Result<Vec<LeaderboardEntry>>;
}

/// JSON-over-HTTP backend.
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProofPulseError::Backend(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &BackendConfig) -> Result<Self> {
        Self::new(&config.base_url, Duration::from_secs(config.timeout_secs))
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/api/v1/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.endpoint(path);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ProofPulseError::Backend(format!("GET {url} failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ProofPulseError::Backend(format!(
                "GET {url} returned {status}: {body}"
            )));
        }

        resp.json::<T>()
            .await
            .map_err(|e| ProofPulseError::Backend(format!("Invalid JSON from {url}: {e}")))
    }
}

#[async_trait]
impl StatsBackend for HttpBackend {
    fn name(&self) -> &str {
        "http"
    }

    async fn metrics_summary(&self) -> Result<MetricsSummary> {
        self.get_json("metrics/summary").await
    }

    async fn analytics_overview(&self) -> Result<AnalyticsOverview> {
        self.get_json("analytics/overview").await
    }

    async fn leaderboard(&self, limit: usize) -> Result<Vec<LeaderboardEntry>> {
        self.get_json(&format!("gamification/leaderboard?limit={limit}"))
            .await
    }
}

/// Backend used when nothing is configured. Every call fails.
#[derive(Debug, Default)]
pub struct OfflineBackend;

#[async_trait]
impl StatsBackend for OfflineBackend {
    fn name(&self) -> &str {
        "offline"
    }

    async fn metrics_summary(&self) -> Result<MetricsSummary> {
        Err(ProofPulseError::Backend("offline".into()))
    }

    async fn analytics_overview(&self) -> Result<AnalyticsOverview> {
        Err(ProofPulseError::Backend("offline".into()))
    }

    async fn leaderboard(&self, _limit: usize) -> Result<Vec<LeaderboardEntry>> {
        Err(ProofPulseError::Backend("offline".into()))
    }
}
