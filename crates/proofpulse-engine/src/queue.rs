//! Priority queue — bounded holding area for not-yet-displayed items.
//!
//! Ordering is decided once, at enqueue time, without sorting:
//! urgent goes to the front, high goes behind the leading urgent/high run,
//! everything else is appended. High, medium and low stay FIFO within
//! their band; urgent is last-in-first-out.
//! Overflow truncates the tail silently.

use std::collections::VecDeque;

use proofpulse_core::{Priority, ProofItem};

/// Bounded, priority-ordered queue of pending items.
#[derive(Debug)]
pub struct ProofQueue {
    items: VecDeque<ProofItem>,
    capacity: usize,
}

impl ProofQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity.min(64)),
            capacity,
        }
    }

    /// Insert by priority band, then truncate to capacity.
    /// Returns whatever fell off the tail (possibly `item` itself).
    pub fn enqueue(&mut self, item: ProofItem) -> Vec<ProofItem> {
        match item.priority {
            Priority::Urgent => self.items.push_front(item),
            Priority::High => {
                let idx = self
                    .items
                    .iter()
                    .position(|i| i.priority < Priority::High)
                    .unwrap_or(self.items.len());
                self.items.insert(idx, item);
            }
            Priority::Medium | Priority::Low => self.items.push_back(item),
        }
        self.truncate()
    }

    /// Remove and return the front item.
    pub fn dequeue_front(&mut self) -> Option<ProofItem> {
        self.items.pop_front()
    }

    /// Snapshot copy for observers.
    pub fn peek_all(&self) -> Vec<ProofItem> {
        self.items.iter().cloned().collect()
    }

    /// Change the bound. Shrinking drops the tail immediately.
    pub fn set_capacity(&mut self, capacity: usize) -> Vec<ProofItem> {
        self.capacity = capacity;
        self.truncate()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.items.len() >= self.capacity
    }

    fn truncate(&mut self) -> Vec<ProofItem> {
        if self.items.len() > self.capacity {
            self.items.split_off(self.capacity).into()
        } else {
            Vec::new()
        }
    }
}
