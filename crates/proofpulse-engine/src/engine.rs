//! Proof engine — the lifecycle controller and the only public entry point.
//!
//! ```text
//! initialize(patch) ─┬─ burst: 10 synthetic items → queue
//!                    ├─ generator loop   every 3s     → queue
//!                    ├─ display loop     every N ms   → current → auto-dismiss
//!                    ├─ stats loop       every 5s     → jitter (+20% reconcile)
//!                    └─ once: reconcile + achievements sync
//! ```
//!
//! State lives behind one mutex and every timer callback runs to completion
//! under it; notifications are collected there and published after the lock
//! is released. Each start bumps an epoch: callbacks, auto-dismiss timers and
//! in-flight RPC continuations from an older epoch are discarded. Delivery
//! and teardown share a gate, so once `destroy` returns no listener fires,
//! whatever runtime flavor drives the engine.

use std::cell::RefCell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use proofpulse_core::{
    EngineConfig, EngineConfigPatch, LiveStats, ProofDraft, ProofItem, ProofPulseError, Result,
    Testimonial,
};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::backend::StatsBackend;
use crate::display::{DisplaySlot, RetireReason};
use crate::generator::{self, GENERATE_EVERY, INITIAL_BURST};
use crate::hub::{Event, EventHub, StateChange, Subscription};
use crate::queue::ProofQueue;
use crate::stats::{self, ACHIEVEMENT_SYNC_LIMIT, ReconcileOutcome, STATS_EVERY};
use crate::store::SnapshotStore;
use crate::testimonials::{self, TestimonialQuery};

/// Lower bound for the display loop period, so a zero interval cannot spin.
const MIN_DISPLAY_INTERVAL: Duration = Duration::from_millis(10);

static PROOF_SEQ: AtomicU64 = AtomicU64::new(0);

/// Process-unique id: creation time + sequence + random suffix.
fn next_proof_id() -> String {
    let seq = PROOF_SEQ.fetch_add(1, Ordering::Relaxed);
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "proof-{}-{}-{}",
        Utc::now().timestamp_millis(),
        seq,
        &suffix[..8]
    )
}

/// Point-in-time engine summary.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub running: bool,
    /// Incremented on every start and stop.
    pub epoch: u64,
    pub queued: usize,
    pub current: Option<String>,
    pub generated_total: u64,
    pub displayed_total: u64,
    pub evicted_total: u64,
    pub state_listeners: usize,
    pub stats_listeners: usize,
}

#[derive(Debug, Default)]
struct Counters {
    generated: u64,
    displayed: u64,
    evicted: u64,
}

struct EngineState {
    config: EngineConfig,
    queue: ProofQueue,
    display: DisplaySlot,
    stats: LiveStats,
    rng: StdRng,
    running: bool,
    epoch: u64,
    counters: Counters,
}

impl EngineState {
    fn is_active(&self, epoch: u64) -> bool {
        self.running && self.epoch == epoch
    }

    /// Admission + enqueue shared by every producer.
    fn admit(
        &mut self,
        draft: ProofDraft,
        timestamp: DateTime<Utc>,
        events: &mut Vec<Event>,
    ) -> Option<String> {
        if !self.config.admits(draft.kind, draft.resolved_priority()) {
            tracing::debug!("🚫 Filtered out {} item", draft.kind);
            return None;
        }
        let id = next_proof_id();
        let evicted = self.queue.enqueue(draft.into_item(id.clone(), timestamp));
        if !evicted.is_empty() {
            self.counters.evicted += evicted.len() as u64;
            tracing::debug!("🗑️ Queue overflow: evicted {} item(s)", evicted.len());
        }
        if !evicted.iter().any(|i| i.id == id) {
            events.push(Event::State(StateChange::Enqueued { id: id.clone() }));
        }
        Some(id)
    }

    /// Drop queue and current. Returns whether anything was dropped.
    fn clear(&mut self) -> bool {
        let had_any = !self.queue.is_empty() || self.display.is_occupied();
        self.queue.clear();
        self.display.clear();
        had_any
    }
}

thread_local! {
    /// Gates this thread is currently delivering through.
    static DELIVERING: RefCell<Vec<usize>> = const { RefCell::new(Vec::new()) };
}

/// Serializes listener delivery against teardown. Re-entrant per thread, so
/// a listener may call back into the engine, `destroy` included.
#[derive(Default)]
struct PublishGate {
    lock: Mutex<()>,
}

struct GateGuard<'a> {
    key: usize,
    held: Option<MutexGuard<'a, ()>>,
}

impl PublishGate {
    fn enter(&self) -> GateGuard<'_> {
        let key = self as *const Self as usize;
        if DELIVERING.with(|d| d.borrow().contains(&key)) {
            return GateGuard { key, held: None };
        }
        let held = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        DELIVERING.with(|d| d.borrow_mut().push(key));
        GateGuard {
            key,
            held: Some(held),
        }
    }
}

impl Drop for GateGuard<'_> {
    fn drop(&mut self) {
        if self.held.take().is_some() {
            DELIVERING.with(|d| d.borrow_mut().retain(|k| *k != self.key));
        }
    }
}

struct Inner {
    state: Mutex<EngineState>,
    hub: EventHub,
    gate: PublishGate,
    backend: Arc<dyn StatsBackend>,
    store: Option<SnapshotStore>,
    leaderboard_limit: usize,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn track(&self, handle: JoinHandle<()>) {
        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        tasks.retain(|h| !h.is_finished());
        tasks.push(handle);
    }

    fn abort_tasks(&self) {
        let handles = std::mem::take(&mut *self.tasks.lock().unwrap_or_else(|e| e.into_inner()));
        for handle in handles {
            handle.abort();
        }
    }

    /// Clean start: new epoch, empty queue, burst, then spawn every job.
    fn start(self: &Arc<Self>) {
        let (epoch, events) = {
            let mut state = self.lock();
            state.running = true;
            state.epoch += 1;
            state.clear();
            let capacity = state.config.max_queue;
            state.queue.set_capacity(capacity);

            let state = &mut *state;
            let mut events = Vec::new();
            for _ in 0..INITIAL_BURST {
                let Some(draft) = generator::synthesize(&state.config, &mut state.rng) else {
                    break;
                };
                if state.admit(draft, Utc::now(), &mut events).is_some() {
                    state.counters.generated += 1;
                }
            }
            (state.epoch, events)
        };
        tracing::info!(
            "🚀 Proof engine started (epoch {epoch}, backend: {})",
            self.backend.name()
        );
        self.publish(epoch, events);
        self.spawn_jobs(epoch);
    }

    /// Tear down: abort every task, drop queue and current. Waits for any
    /// delivery in progress on another thread.
    fn stop(&self, notify: bool) {
        let _gate = self.gate.enter();
        self.abort_tasks();
        let events = {
            let mut state = self.lock();
            if !state.running {
                return;
            }
            state.running = false;
            state.epoch += 1;
            let dropped = state.clear();
            if notify && dropped {
                vec![Event::State(StateChange::Cleared)]
            } else {
                Vec::new()
            }
        };
        tracing::info!("🛑 Proof engine stopped");
        self.hub.publish(events);
    }

    /// Deliver `events` while `epoch` is still live.
    fn publish(&self, epoch: u64, events: Vec<Event>) {
        if events.is_empty() {
            return;
        }
        let _gate = self.gate.enter();
        for event in events {
            if !self.lock().is_active(epoch) {
                return;
            }
            self.hub.publish(vec![event]);
        }
    }

    fn spawn_jobs(self: &Arc<Self>, epoch: u64) {
        let weak = Arc::downgrade(self);

        let generator = tokio::spawn({
            let weak = weak.clone();
            async move {
                let mut interval =
                    tokio::time::interval_at(Instant::now() + GENERATE_EVERY, GENERATE_EVERY);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    interval.tick().await;
                    let Some(inner) = weak.upgrade() else { break };
                    if !inner.generator_tick(epoch) {
                        break;
                    }
                }
            }
        });

        let display = tokio::spawn({
            let weak = weak.clone();
            async move {
                loop {
                    let period = match weak.upgrade() {
                        Some(inner) => inner.display_interval(),
                        None => break,
                    };
                    tokio::time::sleep(period).await;
                    let Some(inner) = weak.upgrade() else { break };
                    if !inner.display_tick(epoch) {
                        break;
                    }
                }
            }
        });

        let stats = tokio::spawn({
            let weak = weak.clone();
            async move {
                let mut interval =
                    tokio::time::interval_at(Instant::now() + STATS_EVERY, STATS_EVERY);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    interval.tick().await;
                    let Some(inner) = weak.upgrade() else { break };
                    if !inner.stats_tick(epoch) {
                        break;
                    }
                }
            }
        });

        let bootstrap = tokio::spawn({
            let weak = weak.clone();
            async move {
                let Some(inner) = weak.upgrade() else { return };
                inner.reconcile(epoch).await;
                inner.sync_achievements(epoch).await;
            }
        });

        for handle in [generator, display, stats, bootstrap] {
            self.track(handle);
        }
    }

    fn display_interval(&self) -> Duration {
        self.lock().config.display_interval().max(MIN_DISPLAY_INTERVAL)
    }

    /// Returns false once `epoch` is stale, ending the loop.
    fn generator_tick(&self, epoch: u64) -> bool {
        let events = {
            let mut state = self.lock();
            if !state.is_active(epoch) {
                return false;
            }
            if !generator::should_generate(state.queue.len(), &state.config) {
                tracing::debug!("⏭️ Queue full ({}), skipping generation", state.queue.len());
                return true;
            }
            let state = &mut *state;
            let mut events = Vec::new();
            let Some(draft) = generator::synthesize(&state.config, &mut state.rng) else {
                tracing::debug!("⏭️ No eligible proof types, skipping generation");
                return true;
            };
            if state.admit(draft, Utc::now(), &mut events).is_some() {
                state.counters.generated += 1;
            }
            events
        };
        self.publish(epoch, events);
        true
    }

    fn display_tick(self: &Arc<Self>, epoch: u64) -> bool {
        let (promoted, duration) = {
            let mut state = self.lock();
            if !state.is_active(epoch) {
                return false;
            }
            let state = &mut *state;
            let Some(item) = state.display.promote(&mut state.queue) else {
                return true;
            };
            state.counters.displayed += 1;
            (item, state.config.display_duration())
        };

        tracing::debug!("📣 Showing [{}] {}", promoted.priority, promoted.title);
        self.publish(
            epoch,
            vec![Event::State(StateChange::Promoted {
                id: promoted.id.clone(),
            })],
        );

        let weak: Weak<Self> = Arc::downgrade(self);
        let id = promoted.id;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            if let Some(inner) = weak.upgrade() {
                inner.expire(epoch, &id);
            }
        });
        self.track(handle);
        true
    }

    fn expire(&self, epoch: u64, id: &str) {
        let retired = {
            let mut state = self.lock();
            if !state.is_active(epoch) {
                return;
            }
            state.display.expire(id)
        };
        if let Some(item) = retired {
            self.publish(
                epoch,
                vec![Event::State(StateChange::Retired {
                    id: item.id,
                    reason: RetireReason::Expired,
                })],
            );
        }
    }

    fn stats_tick(self: &Arc<Self>, epoch: u64) -> bool {
        let (snapshot, reconcile) = {
            let mut state = self.lock();
            if !state.is_active(epoch) {
                return false;
            }
            let state = &mut *state;
            let reconcile = stats::should_reconcile(&mut state.rng);
            stats::apply_jitter(&mut state.stats, &mut state.rng);
            (state.stats.clone(), reconcile)
        };

        if reconcile {
            let weak = Arc::downgrade(self);
            let handle = tokio::spawn(async move {
                if let Some(inner) = weak.upgrade() {
                    inner.reconcile(epoch).await;
                }
            });
            self.track(handle);
        }

        self.publish(epoch, vec![Event::Stats(snapshot)]);
        true
    }

    async fn reconcile(&self, epoch: u64) -> ReconcileOutcome {
        let reading = stats::fetch(self.backend.as_ref()).await;

        let snapshot = {
            let mut state = self.lock();
            if !state.is_active(epoch) {
                tracing::debug!("🧹 Discarding reconciliation from epoch {epoch}");
                return ReconcileOutcome::Discarded;
            }
            if !stats::merge(&mut state.stats, &reading) {
                tracing::debug!("📉 Reconciliation: no backend data, keeping local stats");
                return ReconcileOutcome::NoData;
            }
            state.stats.clone()
        };

        tracing::debug!("📈 Reconciled stats: {} active users", snapshot.active_users);
        if let Some(store) = &self.store {
            if let Err(e) = store.save(&snapshot) {
                tracing::warn!("⚠️ Failed to save stats snapshot: {e}");
            }
        }
        self.publish(epoch, vec![Event::Stats(snapshot)]);
        ReconcileOutcome::Applied
    }

    async fn sync_achievements(&self, epoch: u64) -> usize {
        let entries = stats::fetch_leaderboard(
            self.backend.as_ref(),
            self.leaderboard_limit.min(ACHIEVEMENT_SYNC_LIMIT),
        )
        .await;
        if entries.is_empty() {
            return 0;
        }

        let (added, events) = {
            let mut state = self.lock();
            if !state.is_active(epoch) {
                return 0;
            }
            let state = &mut *state;
            let drafts = stats::achievement_drafts(&entries, Utc::now(), &mut state.rng);
            let mut events = Vec::new();
            let added = drafts
                .into_iter()
                .filter_map(|(draft, at)| state.admit(draft, at, &mut events))
                .count();
            (added, events)
        };
        tracing::info!("🏆 Synced {added} recent achievement(s)");
        self.publish(epoch, events);
        added
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.abort_tasks();
    }
}

/// Builder for [`ProofEngine`].
pub struct EngineBuilder {
    backend: Arc<dyn StatsBackend>,
    seed: Option<u64>,
    store: Option<SnapshotStore>,
    leaderboard_limit: usize,
}

impl EngineBuilder {
    /// Fixed RNG seed for reproducible generation and jitter.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Persist LiveStats after each applied reconciliation and seed the
    /// initial stats from the last snapshot.
    pub fn snapshot_store(mut self, store: SnapshotStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn leaderboard_limit(mut self, limit: usize) -> Self {
        self.leaderboard_limit = limit;
        self
    }

    pub fn build(self) -> ProofEngine {
        let rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let stats = self
            .store
            .as_ref()
            .and_then(SnapshotStore::load)
            .unwrap_or_default();
        let config = EngineConfig {
            enabled: false,
            ..EngineConfig::default()
        };

        ProofEngine {
            inner: Arc::new(Inner {
                state: Mutex::new(EngineState {
                    queue: ProofQueue::new(config.max_queue),
                    config,
                    display: DisplaySlot::new(),
                    stats,
                    rng,
                    running: false,
                    epoch: 0,
                    counters: Counters::default(),
                }),
                hub: EventHub::new(),
                gate: PublishGate::default(),
                backend: self.backend,
                store: self.store,
                leaderboard_limit: self.leaderboard_limit,
                tasks: Mutex::new(Vec::new()),
            }),
        }
    }
}

/// Handle to one engine instance. Cheap to clone; all clones share state.
/// Dropping the last handle stops every background job.
///
/// A listener that captures a `ProofEngine` keeps the engine alive until
/// [`ProofEngine::destroy`]; capture a [`WeakEngine`] instead.
#[derive(Clone)]
pub struct ProofEngine {
    inner: Arc<Inner>,
}

/// Non-owning engine handle for listeners and other back-references.
#[derive(Clone)]
pub struct WeakEngine {
    inner: Weak<Inner>,
}

impl WeakEngine {
    /// The engine, unless every [`ProofEngine`] handle has been dropped.
    pub fn upgrade(&self) -> Option<ProofEngine> {
        self.inner.upgrade().map(|inner| ProofEngine { inner })
    }
}

impl ProofEngine {
    pub fn new(backend: Arc<dyn StatsBackend>) -> Self {
        Self::builder(backend).build()
    }

    pub fn downgrade(&self) -> WeakEngine {
        WeakEngine {
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub fn builder(backend: Arc<dyn StatsBackend>) -> EngineBuilder {
        EngineBuilder {
            backend,
            seed: None,
            store: None,
            leaderboard_limit: ACHIEVEMENT_SYNC_LIMIT,
        }
    }

    /// Merge `patch` over the defaults and, if enabled, start from a clean
    /// state. A running engine is torn down first. Needs a tokio runtime.
    pub fn initialize(&self, patch: EngineConfigPatch) -> Result<()> {
        let config = EngineConfig::from_patch(&patch);
        let enabled = config.enabled;
        if enabled {
            ensure_runtime()?;
        }
        self.inner.stop(false);
        {
            let mut state = self.inner.lock();
            state.queue.set_capacity(config.max_queue);
            state.config = config;
        }
        if enabled {
            self.inner.start();
        } else {
            tracing::info!("⏸️ Proof engine initialized disabled");
        }
        Ok(())
    }

    /// Merge `patch` into the live config.
    ///
    /// `enabled` true→false tears everything down; false→true restarts from
    /// scratch. Other changes apply on the next tick without restarting.
    pub fn update_config(&self, patch: EngineConfigPatch) -> Result<()> {
        if patch.enabled == Some(true) && !self.inner.lock().config.enabled {
            ensure_runtime()?;
        }

        let (was, now, epoch, events) = {
            let mut state = self.inner.lock();
            let was = state.config.enabled;
            state.config.merge(&patch);
            let now = state.config.enabled;

            let capacity = state.config.max_queue;
            let evicted = state.queue.set_capacity(capacity);
            let mut events = Vec::new();
            if !evicted.is_empty() {
                state.counters.evicted += evicted.len() as u64;
                if state.running {
                    events.push(Event::State(StateChange::Evicted {
                        count: evicted.len(),
                    }));
                }
            }
            (was, now, state.epoch, events)
        };
        self.inner.publish(epoch, events);

        match (was, now) {
            (true, false) => self.inner.stop(true),
            (false, true) => self.inner.start(),
            _ => tracing::debug!("🔧 Engine config updated live"),
        }
        Ok(())
    }

    /// Submit an item from outside the generator. Returns the assigned id,
    /// or `None` when the engine is stopped or the filters reject it.
    /// A full queue may evict the item immediately; that is not an error.
    pub fn add_proof(&self, draft: ProofDraft) -> Option<String> {
        let (id, epoch, events) = {
            let mut state = self.inner.lock();
            if !state.running {
                tracing::debug!("⏸️ Engine stopped, dropping {} item", draft.kind);
                return None;
            }
            let mut events = Vec::new();
            let id = state.admit(draft, Utc::now(), &mut events)?;
            (id, state.epoch, events)
        };
        self.inner.publish(epoch, events);
        Some(id)
    }

    pub fn current_proof(&self) -> Option<ProofItem> {
        self.inner.lock().display.current().cloned()
    }

    /// Copy of the pending queue in display order.
    pub fn queue(&self) -> Vec<ProofItem> {
        self.inner.lock().queue.peek_all()
    }

    /// Retire the current item now. A later auto-dismiss for it is a no-op.
    pub fn dismiss_current(&self) -> Option<ProofItem> {
        let (dismissed, epoch) = {
            let mut state = self.inner.lock();
            let epoch = state.epoch;
            (state.display.dismiss()?, epoch)
        };
        self.inner.publish(
            epoch,
            vec![Event::State(StateChange::Retired {
                id: dismissed.id.clone(),
                reason: RetireReason::Dismissed,
            })],
        );
        Some(dismissed)
    }

    pub fn live_stats(&self) -> LiveStats {
        self.inner.lock().stats.clone()
    }

    pub fn testimonials(&self, query: &TestimonialQuery) -> Vec<Testimonial> {
        testimonials::query(query)
    }

    /// Listen for queue/current changes.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&StateChange) + Send + Sync + 'static,
    {
        self.inner.hub.subscribe(listener)
    }

    /// Listen for stats; the current value is delivered once immediately.
    pub fn subscribe_to_stats<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&LiveStats) + Send + Sync + 'static,
    {
        let current = self.live_stats();
        self.inner.hub.subscribe_stats(&current, listener)
    }

    pub fn config(&self) -> EngineConfig {
        self.inner.lock().config.clone()
    }

    pub fn status(&self) -> EngineStatus {
        let state = self.inner.lock();
        EngineStatus {
            running: state.running,
            epoch: state.epoch,
            queued: state.queue.len(),
            current: state.display.current().map(|i| i.id.clone()),
            generated_total: state.counters.generated,
            displayed_total: state.counters.displayed,
            evicted_total: state.counters.evicted,
            state_listeners: self.inner.hub.state_listeners(),
            stats_listeners: self.inner.hub.stats_listeners(),
        }
    }

    /// Reconcile against the backend now. `Discarded` if the engine is
    /// stopped, or stops/restarts before the calls return.
    pub async fn reconcile_now(&self) -> ReconcileOutcome {
        let epoch = {
            let state = self.inner.lock();
            if !state.running {
                return ReconcileOutcome::Discarded;
            }
            state.epoch
        };
        self.inner.reconcile(epoch).await
    }

    /// Pull recent leaderboard achievements into the queue. Returns how many
    /// were admitted.
    pub async fn sync_recent_achievements(&self) -> usize {
        let epoch = {
            let state = self.inner.lock();
            if !state.running {
                return 0;
            }
            state.epoch
        };
        self.inner.sync_achievements(epoch).await
    }

    /// Stop every timer and drop queue and current. Idempotent. A later
    /// `update_config` with `enabled: true` starts again.
    pub fn destroy(&self) {
        self.inner.stop(false);
        self.inner.lock().config.enabled = false;
    }
}

fn ensure_runtime() -> Result<()> {
    tokio::runtime::Handle::try_current()
        .map(|_| ())
        .map_err(|e| ProofPulseError::Runtime(format!("Proof engine needs a tokio runtime: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{AnalyticsOverview, LeaderboardEntry, MetricsSummary, OfflineBackend};
    use async_trait::async_trait;
    use proofpulse_core::types::MIN_ACTIVE_USERS;
    use proofpulse_core::{Priority, ProofType, UserInfo};
    use std::sync::atomic::{AtomicBool, AtomicUsize};
    use tokio::time::sleep;

    #[derive(Default)]
    struct StubBackend {
        metrics: Option<MetricsSummary>,
        analytics: Option<AnalyticsOverview>,
        leaderboard: Vec<LeaderboardEntry>,
        delay: Duration,
    }

    #[async_trait]
    impl StatsBackend for StubBackend {
        fn name(&self) -> &str {
            "stub"
        }
        async fn metrics_summary(&self) -> Result<MetricsSummary> {
            sleep(self.delay).await;
            self.metrics
                .clone()
                .ok_or_else(|| ProofPulseError::Backend("no metrics".into()))
        }
        async fn analytics_overview(&self) -> Result<AnalyticsOverview> {
            sleep(self.delay).await;
            self.analytics
                .clone()
                .ok_or_else(|| ProofPulseError::Backend("no analytics".into()))
        }
        async fn leaderboard(&self, limit: usize) -> Result<Vec<LeaderboardEntry>> {
            Ok(self.leaderboard.iter().take(limit).cloned().collect())
        }
    }

    fn offline_engine() -> ProofEngine {
        ProofEngine::builder(Arc::new(OfflineBackend)).seed(42).build()
    }

    fn draft(kind: ProofType) -> ProofDraft {
        ProofDraft::new(
            kind,
            "Manual",
            "added by test",
            "🧪",
            UserInfo {
                name: "Tester".into(),
                location: None,
                verified: true,
            },
        )
    }

    fn timing(duration_ms: u64, interval_ms: u64) -> EngineConfigPatch {
        EngineConfigPatch {
            display_duration_ms: Some(duration_ms),
            display_interval_ms: Some(interval_ms),
            ..Default::default()
        }
    }

    fn counter() -> (Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let c = Arc::new(AtomicUsize::new(0));
        (c.clone(), c)
    }

    #[test]
    fn test_initialize_requires_runtime() {
        let engine = offline_engine();
        let err = engine.initialize(EngineConfigPatch::default()).unwrap_err();
        assert!(matches!(err, ProofPulseError::Runtime(_)));
        assert!(!engine.status().running);
    }

    #[test]
    fn test_initialize_disabled_without_runtime() {
        let engine = offline_engine();
        engine
            .initialize(EngineConfigPatch {
                enabled: Some(false),
                ..Default::default()
            })
            .unwrap();
        assert!(!engine.status().running);
        assert!(engine.queue().is_empty());
        assert!(engine.add_proof(draft(ProofType::Signup)).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_initialize_bursts_queue() {
        let engine = offline_engine();
        engine.initialize(EngineConfigPatch::default()).unwrap();
        let status = engine.status();
        assert!(status.running);
        assert_eq!(status.queued, INITIAL_BURST);
        assert_eq!(status.generated_total, INITIAL_BURST as u64);
        assert!(engine.current_proof().is_none());
        engine.destroy();
    }

    #[tokio::test(start_paused = true)]
    async fn test_display_turnover() {
        let engine = offline_engine();
        engine.initialize(timing(5_000, 8_000)).unwrap();

        sleep(Duration::from_millis(8_001)).await;
        let first = engine.current_proof().expect("promoted at 8s");

        sleep(Duration::from_millis(5_000)).await;
        assert!(engine.current_proof().is_none(), "expired at 13s");

        sleep(Duration::from_millis(3_000)).await;
        let second = engine.current_proof().expect("promoted at 16s");
        assert_ne!(first.id, second.id);
        assert_eq!(engine.status().displayed_total, 2);
        engine.destroy();
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_is_noop_while_showing() {
        let engine = offline_engine();
        engine.initialize(timing(20_000, 8_000)).unwrap();

        sleep(Duration::from_millis(8_001)).await;
        let first = engine.current_proof().unwrap();
        sleep(Duration::from_millis(8_000)).await;
        assert_eq!(engine.current_proof().unwrap().id, first.id);
        assert_eq!(engine.status().displayed_total, 1);
        engine.destroy();
    }

    #[tokio::test(start_paused = true)]
    async fn test_dismiss_beats_timer() {
        let engine = offline_engine();
        engine.initialize(timing(5_000, 8_000)).unwrap();

        let retired = Arc::new(Mutex::new(Vec::new()));
        let sink = retired.clone();
        let _sub = engine.subscribe(move |change| {
            if let StateChange::Retired { reason, .. } = change {
                sink.lock().unwrap().push(*reason);
            }
        });

        sleep(Duration::from_millis(8_001)).await;
        let shown = engine.current_proof().unwrap();
        assert_eq!(engine.dismiss_current().unwrap().id, shown.id);
        assert!(engine.current_proof().is_none());
        assert!(engine.dismiss_current().is_none());

        sleep(Duration::from_millis(6_000)).await;
        assert!(engine.current_proof().is_none());
        assert_eq!(*retired.lock().unwrap(), vec![RetireReason::Dismissed]);
        engine.destroy();
    }

    #[tokio::test(start_paused = true)]
    async fn test_destroy_silences_everything() {
        let engine = offline_engine();
        engine.initialize(timing(5_000, 8_000)).unwrap();

        let (state_hits, s) = counter();
        let _a = engine.subscribe(move |_| {
            s.fetch_add(1, Ordering::SeqCst);
        });
        let (stats_hits, s) = counter();
        let _b = engine.subscribe_to_stats(move |_| {
            s.fetch_add(1, Ordering::SeqCst);
        });

        // Promotion at 8s arms an auto-dismiss for 13s.
        sleep(Duration::from_millis(9_000)).await;
        assert!(engine.current_proof().is_some());
        engine.destroy();
        engine.destroy();

        let state_before = state_hits.load(Ordering::SeqCst);
        let stats_before = stats_hits.load(Ordering::SeqCst);
        sleep(Duration::from_secs(60)).await;

        assert_eq!(state_hits.load(Ordering::SeqCst), state_before);
        assert_eq!(stats_hits.load(Ordering::SeqCst), stats_before);
        assert!(engine.current_proof().is_none());
        assert!(engine.queue().is_empty());
        assert!(!engine.status().running);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disable_and_reenable() {
        let engine = offline_engine();
        engine.initialize(EngineConfigPatch::default()).unwrap();

        let cleared = Arc::new(AtomicUsize::new(0));
        let c = cleared.clone();
        let _sub = engine.subscribe(move |change| {
            if *change == StateChange::Cleared {
                c.fetch_add(1, Ordering::SeqCst);
            }
        });

        engine
            .update_config(EngineConfigPatch {
                enabled: Some(false),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(cleared.load(Ordering::SeqCst), 1);
        assert!(engine.queue().is_empty());
        assert!(!engine.status().running);

        sleep(Duration::from_secs(20)).await;
        assert!(engine.current_proof().is_none());
        assert!(engine.queue().is_empty());

        engine
            .update_config(EngineConfigPatch {
                enabled: Some(true),
                ..Default::default()
            })
            .unwrap();
        assert!(engine.status().running);
        assert_eq!(engine.queue().len(), INITIAL_BURST);
        engine.destroy();
    }

    #[tokio::test(start_paused = true)]
    async fn test_live_update_keeps_timers() {
        let engine = offline_engine();
        engine.initialize(EngineConfigPatch::default()).unwrap();
        let epoch = engine.status().epoch;

        // Let the display loop arm its first 8s sleep.
        sleep(Duration::from_millis(1)).await;
        engine.update_config(timing(1_000, 2_000)).unwrap();
        assert_eq!(engine.status().epoch, epoch);
        assert_eq!(engine.queue().len(), INITIAL_BURST);
        assert_eq!(engine.config().display_interval_ms, 2_000);

        // The already-armed 8s sleep is not shortened; the next one uses 2s.
        sleep(Duration::from_millis(8_000)).await;
        assert!(engine.current_proof().is_some());
        sleep(Duration::from_millis(1_000)).await;
        assert!(engine.current_proof().is_none());
        sleep(Duration::from_millis(1_000)).await;
        assert!(engine.current_proof().is_some());
        engine.destroy();
    }

    #[tokio::test(start_paused = true)]
    async fn test_shrinking_max_queue_truncates() {
        let engine = offline_engine();
        engine.initialize(EngineConfigPatch::default()).unwrap();
        engine
            .update_config(EngineConfigPatch {
                max_queue: Some(3),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(engine.queue().len(), 3);
        assert_eq!(engine.status().evicted_total, (INITIAL_BURST - 3) as u64);
        engine.destroy();
    }

    #[tokio::test(start_paused = true)]
    async fn test_generator_refills_but_never_overflows() {
        let engine = offline_engine();
        engine
            .initialize(EngineConfigPatch {
                max_queue: Some(4),
                display_interval_ms: Some(1_000),
                display_duration_ms: Some(500),
                ..Default::default()
            })
            .unwrap();
        for _ in 0..30 {
            sleep(Duration::from_millis(700)).await;
            assert!(engine.queue().len() <= 4);
        }
        // Four survived the burst; anything beyond that came from ticks.
        assert!(engine.status().displayed_total > 4);
        engine.destroy();
    }

    #[tokio::test(start_paused = true)]
    async fn test_add_proof_urgent_goes_first() {
        let engine = offline_engine();
        engine.initialize(EngineConfigPatch::default()).unwrap();

        let id = engine
            .add_proof(draft(ProofType::Workflow).with_priority(Priority::Urgent))
            .unwrap();
        let queue = engine.queue();
        assert_eq!(queue[0].id, id);
        assert_eq!(queue[0].priority, Priority::Urgent);
        assert_eq!(queue.len(), INITIAL_BURST);
        engine.destroy();
    }

    #[tokio::test(start_paused = true)]
    async fn test_add_proof_respects_filters() {
        let engine = offline_engine();
        engine
            .initialize(EngineConfigPatch {
                show_purchases: Some(false),
                ..Default::default()
            })
            .unwrap();
        assert!(engine.add_proof(draft(ProofType::Purchase)).is_none());
        assert!(engine.queue().iter().all(|i| i.kind != ProofType::Purchase));
        assert!(engine.add_proof(draft(ProofType::Review)).is_some());
        engine.destroy();
    }

    #[tokio::test(start_paused = true)]
    async fn test_ids_are_unique() {
        let engine = offline_engine();
        engine
            .initialize(EngineConfigPatch {
                max_queue: Some(100),
                ..Default::default()
            })
            .unwrap();
        for _ in 0..50 {
            engine.add_proof(draft(ProofType::Signup));
        }
        let mut ids: Vec<String> = engine.queue().into_iter().map(|i| i.id).collect();
        let total = ids.len();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), total);
        engine.destroy();
    }

    #[tokio::test(start_paused = true)]
    async fn test_getters_return_copies() {
        let engine = offline_engine();
        engine.initialize(EngineConfigPatch::default()).unwrap();

        let mut queue = engine.queue();
        queue.clear();
        assert_eq!(engine.queue().len(), INITIAL_BURST);

        let mut stats = engine.live_stats();
        stats.active_users = 1;
        assert!(engine.live_stats().active_users >= MIN_ACTIVE_USERS);

        let mut config = engine.config();
        config.max_queue = 1;
        assert_eq!(engine.config().max_queue, 10);
        engine.destroy();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stats_replay_and_floor() {
        let engine = offline_engine();
        engine.initialize(EngineConfigPatch::default()).unwrap();

        let (hits, h) = counter();
        let _sub = engine.subscribe_to_stats(move |s| {
            assert!(s.active_users >= MIN_ACTIVE_USERS);
            h.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        sleep(Duration::from_millis(5_001)).await;
        assert!(hits.load(Ordering::SeqCst) >= 2);
        engine.destroy();
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconcile_with_dead_backend_keeps_stats() {
        let engine = offline_engine();
        engine.initialize(EngineConfigPatch::default()).unwrap();
        let before = engine.live_stats();
        assert_eq!(engine.reconcile_now().await, ReconcileOutcome::NoData);
        assert_eq!(engine.live_stats(), before);
        engine.destroy();
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconcile_applies_and_snapshots() {
        let dir = std::env::temp_dir().join("proofpulse-test-engine-snapshot");
        let path = dir.join("stats.json");
        std::fs::remove_dir_all(&dir).ok();

        let backend = StubBackend {
            metrics: Some(MetricsSummary {
                active_users: Some(50_000),
                workflows_run: Some(1),
            }),
            analytics: Some(AnalyticsOverview {
                active_users: None,
                signups_today: Some(7),
            }),
            ..Default::default()
        };
        let engine = ProofEngine::builder(Arc::new(backend))
            .seed(1)
            .snapshot_store(SnapshotStore::new(&path))
            .build();
        engine.initialize(EngineConfigPatch::default()).unwrap();

        assert_eq!(engine.reconcile_now().await, ReconcileOutcome::Applied);
        let stats = engine.live_stats();
        assert_eq!(stats.active_users, 50_000);
        assert_eq!(stats.workflows_run, 1);
        assert_eq!(stats.signups_today, 7);

        let saved = SnapshotStore::new(&path).load().unwrap();
        assert_eq!(saved.signups_today, 7);
        engine.destroy();

        let revived = ProofEngine::builder(Arc::new(OfflineBackend))
            .snapshot_store(SnapshotStore::new(&path))
            .build();
        assert_eq!(revived.live_stats().active_users, 50_000);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_reconcile_is_discarded() {
        let backend = StubBackend {
            metrics: Some(MetricsSummary {
                active_users: Some(90_000),
                workflows_run: None,
            }),
            delay: Duration::from_secs(2),
            ..Default::default()
        };
        let engine = ProofEngine::builder(Arc::new(backend)).seed(3).build();
        engine.initialize(EngineConfigPatch::default()).unwrap();

        let pending = tokio::spawn({
            let engine = engine.clone();
            async move { engine.reconcile_now().await }
        });
        tokio::task::yield_now().await;
        engine.destroy();

        assert_eq!(pending.await.unwrap(), ReconcileOutcome::Discarded);
        assert!(engine.live_stats().active_users < 90_000);
        assert!(!engine.status().running);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconcile_when_stopped() {
        let engine = offline_engine();
        assert_eq!(engine.reconcile_now().await, ReconcileOutcome::Discarded);
        assert_eq!(engine.sync_recent_achievements().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_achievement_sync() {
        let leaderboard = (1..=8)
            .map(|n| LeaderboardEntry {
                user_id: format!("u{n}"),
                username: format!("player{n}"),
                score: 1_000 - n,
                rank: n,
                level: 10 + n,
            })
            .collect();
        let backend = StubBackend {
            leaderboard,
            ..Default::default()
        };
        let engine = ProofEngine::builder(Arc::new(backend)).seed(4).build();
        engine
            .initialize(EngineConfigPatch {
                max_queue: Some(30),
                ..Default::default()
            })
            .unwrap();

        // Bootstrap sync runs once the test yields.
        sleep(Duration::from_millis(1)).await;
        let synced = engine
            .queue()
            .into_iter()
            .filter(|i| i.metadata.get("source").and_then(|v| v.as_str()) == Some("leaderboard"))
            .collect::<Vec<_>>();
        assert_eq!(synced.len(), ACHIEVEMENT_SYNC_LIMIT);
        assert!(synced.iter().all(|i| i.kind == ProofType::Achievement));
        assert!(synced.iter().all(|i| Utc::now() - i.timestamp <= chrono::Duration::hours(1)));

        assert_eq!(engine.sync_recent_achievements().await, ACHIEVEMENT_SYNC_LIMIT);
        engine.destroy();
    }

    #[tokio::test(start_paused = true)]
    async fn test_listener_may_call_getters() {
        let engine = offline_engine();
        let probe = engine.clone();
        let seen = Arc::new(AtomicUsize::new(0));
        let s = seen.clone();
        let _sub = engine.subscribe(move |_| {
            let _ = probe.queue();
            let _ = probe.current_proof();
            s.fetch_add(1, Ordering::SeqCst);
        });
        engine.initialize(EngineConfigPatch::default()).unwrap();
        assert!(seen.load(Ordering::SeqCst) >= INITIAL_BURST);
        engine.destroy();
    }

    /// Reports a higher active-user count on every call.
    struct RisingBackend {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl StatsBackend for RisingBackend {
        fn name(&self) -> &str {
            "rising"
        }
        async fn metrics_summary(&self) -> Result<MetricsSummary> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) as u64;
            Ok(MetricsSummary {
                active_users: Some(90_000 + n * 1_000),
                workflows_run: None,
            })
        }
        async fn analytics_overview(&self) -> Result<AnalyticsOverview> {
            Err(ProofPulseError::Backend("no analytics".into()))
        }
        async fn leaderboard(&self, _limit: usize) -> Result<Vec<LeaderboardEntry>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_initialize_reconciles_once() {
        let backend = Arc::new(RisingBackend {
            calls: AtomicUsize::new(0),
        });
        let engine = ProofEngine::builder(backend.clone()).seed(6).build();
        engine.initialize(EngineConfigPatch::default()).unwrap();

        sleep(Duration::from_millis(1)).await;
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
        assert_eq!(engine.live_stats().active_users, 90_000);
        engine.destroy();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stats_ticks_trigger_reconciles() {
        let backend = Arc::new(RisingBackend {
            calls: AtomicUsize::new(0),
        });
        let engine = ProofEngine::builder(backend.clone()).seed(21).build();
        let peak = Arc::new(AtomicU64::new(0));
        let p = peak.clone();
        let _sub = engine.subscribe_to_stats(move |stats| {
            p.fetch_max(stats.active_users, Ordering::SeqCst);
        });
        engine.initialize(EngineConfigPatch::default()).unwrap();
        sleep(Duration::from_millis(1)).await;
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);

        // 60 ticks at 20% each; jitter alone adds at most 6 per tick.
        for _ in 0..60 {
            sleep(STATS_EVERY).await;
        }
        assert!(backend.calls.load(Ordering::SeqCst) > 1);
        assert!(peak.load(Ordering::SeqCst) >= 91_000);
        engine.destroy();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_destroy_waits_for_inflight_delivery() {
        let engine = offline_engine();
        engine.initialize(timing(5_000, 50)).unwrap();

        let destroyed = Arc::new(AtomicBool::new(false));
        let late = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = std::sync::mpsc::channel();
        let tx = Mutex::new(tx);
        let _sub = engine.subscribe({
            let destroyed = destroyed.clone();
            let late = late.clone();
            move |change| {
                if matches!(change, StateChange::Promoted { .. }) {
                    tx.lock().unwrap().send(()).ok();
                    std::thread::sleep(Duration::from_millis(300));
                }
                if destroyed.load(Ordering::SeqCst) {
                    late.fetch_add(1, Ordering::SeqCst);
                }
            }
        });

        let teardown = engine.clone();
        let flag = destroyed.clone();
        tokio::task::spawn_blocking(move || {
            rx.recv().unwrap();
            std::thread::sleep(Duration::from_millis(100));
            teardown.destroy();
            flag.store(true, Ordering::SeqCst);
        })
        .await
        .unwrap();

        sleep(Duration::from_millis(300)).await;
        assert_eq!(late.load(Ordering::SeqCst), 0);
        assert!(!engine.status().running);
    }

    #[tokio::test(start_paused = true)]
    async fn test_listener_may_destroy_engine() {
        let engine = offline_engine();
        let weak = engine.downgrade();
        let _sub = engine.subscribe(move |change| {
            if matches!(change, StateChange::Promoted { .. }) {
                if let Some(engine) = weak.upgrade() {
                    engine.destroy();
                }
            }
        });
        engine.initialize(EngineConfigPatch::default()).unwrap();

        sleep(Duration::from_millis(8_001)).await;
        assert!(!engine.status().running);
        assert!(engine.current_proof().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_weak_listener_does_not_keep_engine_alive() {
        let engine = offline_engine();
        let weak = engine.downgrade();
        let (hits, h) = counter();
        let observer = engine.downgrade();
        let _sub = engine.subscribe(move |_| {
            if let Some(engine) = observer.upgrade() {
                let _ = engine.current_proof();
            }
            h.fetch_add(1, Ordering::SeqCst);
        });
        engine.initialize(EngineConfigPatch::default()).unwrap();
        assert!(weak.upgrade().is_some());

        drop(engine);
        assert!(weak.upgrade().is_none());

        let before = hits.load(Ordering::SeqCst);
        sleep(Duration::from_secs(30)).await;
        assert_eq!(hits.load(Ordering::SeqCst), before);
    }
}
