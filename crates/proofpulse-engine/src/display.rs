//! Display scheduler — the single "now showing" slot.
//!
//! Per item: `Queued -> Current -> Retired`, never back. Retirement is
//! whichever comes first of the auto-dismiss timer and an explicit
//! dismissal; the loser is a no-op.

use proofpulse_core::ProofItem;
use serde::{Deserialize, Serialize};

use crate::queue::ProofQueue;

/// Why an item left the current slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetireReason {
    Expired,
    Dismissed,
}

#[derive(Debug, Default)]
pub struct DisplaySlot {
    current: Option<ProofItem>,
}

impl DisplaySlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&ProofItem> {
        self.current.as_ref()
    }

    pub fn is_occupied(&self) -> bool {
        self.current.is_some()
    }

    /// Display tick. Moves the queue front into the slot when the slot is
    /// free; returns the promoted item.
    pub fn promote(&mut self, queue: &mut ProofQueue) -> Option<ProofItem> {
        if self.current.is_some() {
            return None;
        }
        let item = queue.dequeue_front()?;
        self.current = Some(item.clone());
        Some(item)
    }

    /// Auto-dismiss for the item `id`. Stale timers (slot empty, or a newer
    /// item showing) change nothing.
    pub fn expire(&mut self, id: &str) -> Option<ProofItem> {
        if self.current.as_ref().is_some_and(|item| item.id == id) {
            self.current.take()
        } else {
            None
        }
    }

    /// Explicit dismissal of whatever is showing.
    pub fn dismiss(&mut self) -> Option<ProofItem> {
        self.current.take()
    }

    pub fn clear(&mut self) {
        self.current = None;
    }
}
