//! Subscription hub — typed fan-out to observers.
//!
//! Two topics, statically distinct: [`StateChange`] for queue/current
//! mutations and [`LiveStats`] for stats updates. Listeners are invoked
//! outside every engine lock, so a listener may call back into the engine
//! getters. Invocation order is unspecified.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use proofpulse_core::LiveStats;
use serde::Serialize;

use crate::display::RetireReason;

/// A queue or current-slot mutation. Observers pull details via getters.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StateChange {
    Enqueued { id: String },
    Promoted { id: String },
    Retired { id: String, reason: RetireReason },
    /// Queue and current slot emptied because the engine was disabled.
    Cleared,
    /// Tail of the queue dropped because `max_queue` shrank.
    Evicted { count: usize },
}

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Listener set for one topic.
pub struct Topic<T> {
    next_id: AtomicU64,
    listeners: Mutex<HashMap<u64, Listener<T>>>,
}

impl<T: 'static> Topic<T> {
    fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            listeners: Mutex::new(HashMap::new()),
        }
    }

    fn add(self: &Arc<Self>, listener: Listener<T>) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.lock().insert(id, listener);
        let topic: Weak<Self> = Arc::downgrade(self);
        Subscription {
            cancel: Some(Box::new(move || {
                if let Some(topic) = topic.upgrade() {
                    topic.lock().remove(&id);
                }
            })),
        }
    }

    /// Invoke every listener with `payload`. The set is snapshotted first,
    /// so listeners may subscribe or unsubscribe from inside a callback.
    fn publish(&self, payload: &T) {
        let listeners: Vec<Listener<T>> = self.lock().values().cloned().collect();
        for listener in listeners {
            listener(payload);
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<u64, Listener<T>>> {
        self.listeners.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Handle returned by `subscribe`. Call [`Subscription::unsubscribe`] to
/// stop receiving events; dropping the handle keeps the listener attached.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// Pending notification collected under the engine lock, published after.
#[derive(Debug, Clone)]
pub enum Event {
    State(StateChange),
    Stats(LiveStats),
}

pub struct EventHub {
    state: Arc<Topic<StateChange>>,
    stats: Arc<Topic<LiveStats>>,
}

impl EventHub {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Topic::new()),
            stats: Arc::new(Topic::new()),
        }
    }

    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&StateChange) + Send + Sync + 'static,
    {
        self.state.add(Arc::new(listener))
    }

    /// Subscribe to stats. `current` is delivered to this listener once,
    /// immediately, so late subscribers always start with a value.
    pub fn subscribe_stats<F>(&self, current: &LiveStats, listener: F) -> Subscription
    where
        F: Fn(&LiveStats) + Send + Sync + 'static,
    {
        let listener: Listener<LiveStats> = Arc::new(listener);
        let subscription = self.stats.add(listener.clone());
        listener(current);
        subscription
    }

    pub fn publish(&self, events: Vec<Event>) {
        for event in events {
            match event {
                Event::State(change) => self.state.publish(&change),
                Event::Stats(stats) => self.stats.publish(&stats),
            }
        }
    }

    pub fn state_listeners(&self) -> usize {
        self.state.len()
    }

    pub fn stats_listeners(&self) -> usize {
        self.stats.len()
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}
