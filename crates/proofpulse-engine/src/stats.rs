//! Stats aggregator — LiveStats that look live even when the backend isn't.
//!
//! ```text
//! every 5s:  20% → fire-and-forget reconcile
//!            jitter: active ±, signups +0/1, workflows +0..49, hours +0..99
//! reconcile: join(metrics_summary, analytics_overview)
//!            both failed → keep previous value
//!            otherwise   → active = max(local, backend), others overwrite
//! ```

use std::time::Duration;

use chrono::{DateTime, Utc};
use proofpulse_core::{LiveStats, ProofDraft, ProofType, UserInfo};
use rand::Rng;
use serde::Serialize;

use crate::backend::{AnalyticsOverview, LeaderboardEntry, MetricsSummary, StatsBackend};

/// Local simulation tick period.
pub const STATS_EVERY: Duration = Duration::from_millis(5_000);

/// Chance a simulation tick also triggers an out-of-band reconcile.
pub const RECONCILE_PROBABILITY: f64 = 0.2;

/// Chance a simulation tick adds one signup.
pub const SIGNUP_PROBABILITY: f64 = 0.3;

/// Maximum leaderboard entries turned into achievement items.
pub const ACHIEVEMENT_SYNC_LIMIT: usize = 5;

/// Result of a reconciliation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileOutcome {
    /// At least one call succeeded and was merged.
    Applied,
    /// Both calls failed; previous stats retained.
    NoData,
    /// The engine stopped or restarted while the calls were in flight.
    Discarded,
}

/// What the backend returned in one reconciliation round.
#[derive(Debug, Clone, Default)]
pub struct BackendReading {
    pub metrics: Option<MetricsSummary>,
    pub analytics: Option<AnalyticsOverview>,
}

impl BackendReading {
    pub fn is_empty(&self) -> bool {
        self.metrics.is_none() && self.analytics.is_none()
    }
}

pub fn should_reconcile<R: Rng>(rng: &mut R) -> bool {
    rng.gen_bool(RECONCILE_PROBABILITY)
}

/// One local simulation step.
pub fn apply_jitter<R: Rng>(stats: &mut LiveStats, rng: &mut R) {
    stats.shift_active_users(rng.gen_range(-3..=6));
    if rng.gen_bool(SIGNUP_PROBABILITY) {
        stats.signups_today = stats.signups_today.saturating_add(1);
    }
    stats.workflows_run = stats.workflows_run.saturating_add(rng.gen_range(0..=49));
    stats.time_saved = stats.time_saved.saturating_add(rng.gen_range(0..=99));
}

/// Query both summaries concurrently. A failure in one never cancels the
/// other; each failure is logged and reads as absent.
pub async fn fetch(backend: &dyn StatsBackend) -> BackendReading {
    let (metrics, analytics) = tokio::join!(backend.metrics_summary(), backend.analytics_overview());

    let metrics = metrics
        .map_err(|e| tracing::warn!("⚠️ [{}] metrics summary unavailable: {e}", backend.name()))
        .ok();
    let analytics = analytics
        .map_err(|e| tracing::warn!("⚠️ [{}] analytics overview unavailable: {e}", backend.name()))
        .ok();

    BackendReading { metrics, analytics }
}

/// Merge a reading into `stats`. Returns false when there was nothing to merge.
pub fn merge(stats: &mut LiveStats, reading: &BackendReading) -> bool {
    if reading.is_empty() {
        return false;
    }

    let backend_active = [
        reading.metrics.as_ref().and_then(|m| m.active_users),
        reading.analytics.as_ref().and_then(|a| a.active_users),
    ]
    .into_iter()
    .flatten()
    .max();
    if let Some(active) = backend_active {
        stats.active_users = stats.active_users.max(active);
    }

    if let Some(signups) = reading.analytics.as_ref().and_then(|a| a.signups_today) {
        stats.signups_today = signups;
    }
    if let Some(workflows) = reading.metrics.as_ref().and_then(|m| m.workflows_run) {
        stats.workflows_run = workflows;
    }

    stats.shift_active_users(0);
    true
}

/// Fetch leaderboard rows for the achievements sync; failure reads as empty.
pub async fn fetch_leaderboard(backend: &dyn StatsBackend, limit: usize) -> Vec<LeaderboardEntry> {
    match backend.leaderboard(limit).await {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!("⚠️ [{}] leaderboard unavailable: {e}", backend.name());
            Vec::new()
        }
    }
}

/// Turn leaderboard rows into achievement drafts, each with a synthetic
/// timestamp within the last hour (the backend supplies none).
pub fn achievement_drafts<R: Rng>(
    entries: &[LeaderboardEntry],
    now: DateTime<Utc>,
    rng: &mut R,
) -> Vec<(ProofDraft, DateTime<Utc>)> {
    entries
        .iter()
        .take(ACHIEVEMENT_SYNC_LIMIT)
        .map(|entry| {
            let mut draft = ProofDraft::new(
                ProofType::Achievement,
                "Level up!",
                &format!("{} reached level {}", entry.username, entry.level),
                "🏆",
                UserInfo {
                    name: entry.username.clone(),
                    location: None,
                    verified: true,
                },
            );
            draft.metadata.insert("level".into(), entry.level.into());
            draft.metadata.insert("rank".into(), entry.rank.into());
            draft.metadata.insert("source".into(), "leaderboard".into());

            let ago = chrono::Duration::seconds(rng.gen_range(0..3_600));
            (draft, now - ago)
        })
        .collect()
}
