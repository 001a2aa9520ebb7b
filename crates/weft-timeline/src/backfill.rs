//! Merging pages of older history into a live timeline.
//!
//! Backfill is purely additive to historical timeline content: it prepends
//! events strictly older than the held window and never touches streaming
//! buffers, pending HITL slots, tool calls, or the agent phase. Pages are
//! range-disjoint from the live stream by construction, so merging is safe
//! at any time, including mid-stream.

use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use weft_events::{ConversationEvent, OrderKey};

use crate::state::ConversationState;

/// One page of older events, as returned by the history REST collaborator.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPage {
    /// Events strictly older than the requesting cursor (ascending; a page
    /// may legitimately overlap the held window at its boundary).
    pub events: Vec<ConversationEvent>,
    /// Whether more history remains before this page.
    pub has_more: bool,
    /// Cursor for the next request: oldest time in this page.
    pub earliest_time_us: i64,
    /// Cursor for the next request: oldest counter in this page.
    pub earliest_counter: i64,
}

/// Count summary of one merge.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Events newly materialized.
    pub inserted: usize,
    /// Events skipped as already held (boundary overlap).
    pub duplicates: usize,
    /// Events refused: not strictly older than the held window, or
    /// transient kinds that never materialize.
    pub rejected: usize,
}

impl ConversationState {
    /// Merge a page of strictly-older events into the timeline head.
    ///
    /// Deduplicates by event id against the held timeline (and within the
    /// page), refuses events that are not strictly older than the current
    /// earliest entry, and adopts the page's cursors. Idempotent: merging
    /// the same page twice equals merging it once.
    pub fn merge_earlier(&mut self, page: HistoryPage) -> MergeOutcome {
        let boundary = self.timeline.earliest_key();
        let mut outcome = MergeOutcome::default();
        let mut fresh: Vec<ConversationEvent> = Vec::with_capacity(page.events.len());

        for event in page.events {
            if self.timeline.contains(event.id()) {
                outcome.duplicates += 1;
                continue;
            }
            if event.is_transient() {
                outcome.rejected += 1;
                debug!(
                    conversation_id = %self.conversation_id,
                    event_id = %event.id(),
                    event_type = event.event_type(),
                    "refusing transient event in history page"
                );
                continue;
            }
            if let Some(boundary) = boundary
                && event.order_key() >= boundary
            {
                outcome.rejected += 1;
                warn!(
                    conversation_id = %self.conversation_id,
                    event_id = %event.id(),
                    event_type = event.event_type(),
                    "refusing history event not strictly older than the held window"
                );
                counter!("timeline_backfill_rejected_total").increment(1);
                continue;
            }
            fresh.push(event);
        }

        fresh.sort_by_key(ConversationEvent::order_key);
        fresh.dedup_by(|a, b| {
            if a.id() == b.id() {
                outcome.duplicates += 1;
                true
            } else {
                false
            }
        });
        outcome.inserted = fresh.len();
        self.timeline.prepend(fresh);

        self.has_earlier = page.has_more;
        self.earliest_time_us = Some(page.earliest_time_us);
        self.earliest_counter = Some(page.earliest_counter);
        outcome
    }

    /// Cursor for the next backfill request: the last page's cursor if one
    /// was merged, else the oldest held event, else the from-the-end
    /// sentinel.
    #[must_use]
    pub fn backfill_cursor(&self) -> OrderKey {
        if let (Some(time_us), Some(counter)) = (self.earliest_time_us, self.earliest_counter) {
            OrderKey::new(time_us, counter)
        } else {
            self.timeline.earliest_key().unwrap_or(OrderKey::MAX)
        }
    }
}
