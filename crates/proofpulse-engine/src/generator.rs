//! Keeps the queue populated with synthetic activity.
//!
//! Pure decision logic; the engine owns the tick timer and the queue.

use std::time::Duration;

use proofpulse_core::{EngineConfig, ProofDraft, ProofType};
use rand::Rng;
use rand::seq::SliceRandom;

use crate::templates;

/// Items enqueued synchronously on start.
pub const INITIAL_BURST: usize = 10;

/// Generator tick period.
pub const GENERATE_EVERY: Duration = Duration::from_millis(3_000);

/// Types the generator may pick under `config`: toggles, type filter and
/// the priority filter applied to each type's table priority.
pub fn eligible_types(config: &EngineConfig) -> Vec<ProofType> {
    ProofType::ALL
        .into_iter()
        .filter(|&kind| config.admits(kind, kind.default_priority()))
        .collect()
}

/// Synthesize one draft, or `None` when no type is eligible.
pub fn synthesize<R: Rng>(config: &EngineConfig, rng: &mut R) -> Option<ProofDraft> {
    let kinds = eligible_types(config);
    let kind = *kinds.choose(rng)?;
    Some(templates::synthetic_draft(kind, rng))
}

/// Whether a periodic tick should produce an item at the current queue size.
pub fn should_generate(queued: usize, config: &EngineConfig) -> bool {
    queued < config.max_queue
}
