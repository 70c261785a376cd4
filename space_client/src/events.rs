//! Entity notifications.
//!
//! The registry reports membership changes twice: as `tracing` log lines
//! (always) and as typed events in a bounded queue that a UI layer can drain
//! once per frame. If nobody drains, the oldest events fall off.

use std::collections::VecDeque;

/// Default number of undrained events kept.
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// A change in registry membership.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityEvent {
    /// First snapshot that mentioned this id.
    Spawned { id: String },
    /// A snapshot omitted this previously known id.
    Removed { id: String },
    /// The whole registry was emptied, e.g. on disconnect.
    Cleared { count: usize },
}

/// Bounded FIFO of entity events.
#[derive(Debug)]
pub struct EventQueue {
    events: VecDeque<EntityEvent>,
    max: usize,
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

impl EventQueue {
    pub fn new(max: usize) -> Self {
        Self {
            events: VecDeque::new(),
            max,
        }
    }

    pub fn push(&mut self, event: EntityEvent) {
        self.events.push_back(event);
        while self.events.len() > self.max {
            self.events.pop_front();
        }
    }

    /// Takes every queued event, oldest first.
    pub fn drain(&mut self) -> Vec<EntityEvent> {
        self.events.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
