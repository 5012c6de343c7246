//! # ProofPulse Engine
//!
//! Real-time social proof scheduler: synthesizes short-lived activity
//! notifications, orders them by priority, shows one at a time with timed
//! turnover, and keeps a live statistics feed that blends backend values
//! with local simulation.
//!
//! ## Architecture
//! ```text
//! Generator (3s) ──┐
//! add_proof() ─────┼─→ ProofQueue (bounded, urgent > high > medium/low)
//! Achievements ────┘        │
//!                           ↓  display tick (display_interval_ms)
//!                      DisplaySlot ── auto-dismiss (display_duration_ms)
//!                           │
//! StatsAggregator (5s) ─────┼─→ EventHub ─→ listeners
//!   └─ StatsBackend (join: metrics + analytics, failures = no data)
//! ```
//!
//! [`ProofEngine`] owns all of it; construct one per application (or per
//! test) and pass it by reference.

pub mod backend;
pub mod display;
pub mod engine;
pub mod generator;
pub mod hub;
pub mod queue;
pub mod stats;
pub mod store;
pub mod templates;
pub mod testimonials;

pub use backend::{
    AnalyticsOverview, HttpBackend, LeaderboardEntry, MetricsSummary, OfflineBackend,
    StatsBackend,
};
pub use display::{DisplaySlot, RetireReason};
pub use engine::{EngineBuilder, EngineStatus, ProofEngine, WeakEngine};
pub use hub::{EventHub, StateChange, Subscription};
pub use queue::ProofQueue;
pub use stats::ReconcileOutcome;
pub use store::SnapshotStore;
pub use testimonials::TestimonialQuery;
