//! The ordered, deduplicated event sequence of one conversation.

use std::collections::HashSet;

use serde::Serialize;
use weft_events::{ConversationEvent, OrderKey};

/// Ordered event sequence scoped to one conversation.
///
/// Ordering key is `(eventTimeUs, eventCounter)` ascending; event ids are
/// used only for deduplication. Live streaming appends at the tail; backfill
/// prepends strictly older pages at the head. Both paths skip ids already
/// held, so the sequence never contains an id twice.
#[derive(Clone, Debug, Default, Serialize)]
#[serde(transparent)]
pub struct Timeline {
    events: Vec<ConversationEvent>,
    #[serde(skip)]
    ids: HashSet<String>,
}

impl Timeline {
    /// Create an empty timeline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of materialized events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the timeline holds no events.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// The materialized events, oldest first.
    #[must_use]
    pub fn events(&self) -> &[ConversationEvent] {
        &self.events
    }

    /// Whether an event id is already materialized.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Ordering key of the oldest held event.
    #[must_use]
    pub fn earliest_key(&self) -> Option<OrderKey> {
        self.events.first().map(ConversationEvent::order_key)
    }

    /// Ordering key of the newest held event.
    #[must_use]
    pub fn latest_key(&self) -> Option<OrderKey> {
        self.events.last().map(ConversationEvent::order_key)
    }

    /// Append a live event at the tail. Returns `false` (and holds the
    /// existing entry) if the id is already materialized.
    ///
    /// Callers are responsible for ordering; the tail key must be
    /// non-decreasing, which the reducer's ordering gate guarantees.
    pub(crate) fn append(&mut self, event: ConversationEvent) -> bool {
        if !self.ids.insert(event.id().to_owned()) {
            return false;
        }
        debug_assert!(
            self.latest_key().is_none_or(|last| event.order_key() >= last),
            "timeline append would regress ordering"
        );
        self.events.push(event);
        true
    }

    /// Prepend a batch of strictly-older events at the head.
    ///
    /// `batch` must be sorted ascending, deduplicated, and entirely older
    /// than the current earliest key — the backfill merge establishes all
    /// three before calling.
    pub(crate) fn prepend(&mut self, batch: Vec<ConversationEvent>) {
        if batch.is_empty() {
            return;
        }
        debug_assert!(
            batch
                .last()
                .is_some_and(|newest| self.earliest_key().is_none_or(|b| newest.order_key() < b)),
            "timeline prepend would overlap the held window"
        );
        for event in &batch {
            let _ = self.ids.insert(event.id().to_owned());
        }
        let _ = self.events.splice(0..0, batch);
    }
}
