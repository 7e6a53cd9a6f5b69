// SPDX-License-Identifier: GPL-3.0-or-later
use std::sync::{Arc, Mutex};

use reseed_domain::{Classification, TrackerProcessed};

/// Receives one `tracker.processed` event per finished tracker run.
pub trait EventPublisher: Send + Sync {
    fn publish(&self, event: &TrackerProcessed);
}

/// Keeps every published tracker event in memory, in publication order.
#[derive(Clone, Default)]
pub struct InMemoryEventBus {
    processed: Arc<Mutex<Vec<TrackerProcessed>>>,
}

impl InMemoryEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_events<R>(&self, read: impl FnOnce(&mut Vec<TrackerProcessed>) -> R) -> R {
        let mut processed = self
            .processed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        read(&mut processed)
    }

    pub fn len(&self) -> usize {
        self.with_events(|processed| processed.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Latest event for `tracker` (case-insensitive).
    pub fn for_tracker(&self, tracker: &str) -> Option<TrackerProcessed> {
        self.with_events(|processed| {
            processed
                .iter()
                .rev()
                .find(|event| event.payload.tracker.eq_ignore_ascii_case(tracker))
                .cloned()
        })
    }

    /// Trackers whose run ended with `classification`.
    pub fn trackers_with(&self, classification: Classification) -> Vec<String> {
        self.with_events(|processed| {
            processed
                .iter()
                .filter(|event| event.payload.classification == classification)
                .map(|event| event.payload.tracker.clone())
                .collect()
        })
    }

    /// Take every event recorded so far.
    pub fn drain(&self) -> Vec<TrackerProcessed> {
        self.with_events(std::mem::take)
    }
}

impl EventPublisher for InMemoryEventBus {
    fn publish(&self, event: &TrackerProcessed) {
        self.with_events(|processed| processed.push(event.clone()));
    }
}
