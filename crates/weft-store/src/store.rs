//! The multi-conversation store: routing, lifecycle, and slot accounting.

use std::collections::HashMap;
use std::sync::Arc;

use metrics::counter;
use tracing::{debug, warn};
use weft_events::ConversationEvent;
use weft_timeline::{Applied, ConversationState, HistoryPage, MergeOutcome};

use crate::admission::StreamGate;
use crate::error::StoreError;

/// One store entry: the state plus its admission accounting.
///
/// `holds_slot` is tracked beside the state rather than derived from it, so
/// a stream that ends by any path (terminal event, local abort, close)
/// releases exactly once.
#[derive(Debug)]
struct Entry {
    state: ConversationState,
    holds_slot: bool,
}

/// Maps conversation id → [`ConversationState`] and routes inbound events to
/// the owning reducer instance.
///
/// Conversations must be explicitly opened before events can route to them;
/// an event for an absent conversation is dropped with a diagnostic, never
/// silently creating state. The store shares one [`StreamGate`] across all
/// entries — the engine's only cross-conversation resource.
pub struct ConversationStore {
    conversations: HashMap<String, Entry>,
    gate: Arc<StreamGate>,
}

impl ConversationStore {
    /// A store with the default streaming cap.
    #[must_use]
    pub fn new() -> Self {
        Self::with_gate(Arc::new(StreamGate::default()))
    }

    /// A store sharing an existing gate (e.g. one gate across several stores
    /// in tests, or a custom capacity).
    #[must_use]
    pub fn with_gate(gate: Arc<StreamGate>) -> Self {
        Self {
            conversations: HashMap::new(),
            gate,
        }
    }

    /// Open a conversation, creating empty state if it is new.
    ///
    /// Returns `true` when state was created, `false` when already open.
    pub fn open(&mut self, conversation_id: &str) -> bool {
        if self.conversations.contains_key(conversation_id) {
            return false;
        }
        let _ = self.conversations.insert(
            conversation_id.to_owned(),
            Entry {
                state: ConversationState::new(conversation_id),
                holds_slot: false,
            },
        );
        debug!(conversation_id, "opened conversation");
        true
    }

    /// Close a conversation and discard its state, releasing its streaming
    /// slot if held. Other conversations' admission accounting is untouched.
    pub fn close(&mut self, conversation_id: &str) -> Result<(), StoreError> {
        let Some(entry) = self.conversations.remove(conversation_id) else {
            return Err(StoreError::UnknownConversation {
                conversation_id: conversation_id.to_owned(),
            });
        };
        if entry.holds_slot {
            self.gate.release();
        }
        debug!(conversation_id, "closed conversation");
        Ok(())
    }

    /// Whether a conversation is open.
    #[must_use]
    pub fn is_open(&self, conversation_id: &str) -> bool {
        self.conversations.contains_key(conversation_id)
    }

    /// Number of open conversations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    /// Whether no conversations are open.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }

    /// Read-only state snapshot for one conversation.
    #[must_use]
    pub fn state(&self, conversation_id: &str) -> Option<&ConversationState> {
        self.conversations.get(conversation_id).map(|e| &e.state)
    }

    /// Iterate open conversations and their states.
    pub fn conversations(&self) -> impl Iterator<Item = (&str, &ConversationState)> {
        self.conversations
            .iter()
            .map(|(id, entry)| (id.as_str(), &entry.state))
    }

    /// Request admission and mark the conversation `connecting`.
    ///
    /// Idempotent while the conversation already holds a slot. Rejected with
    /// [`StoreError::StreamLimitReached`] when the gate is saturated — the
    /// store exposes an admission check, not a scheduler, so the caller
    /// decides whether to queue or surface the refusal.
    pub fn begin_stream(&mut self, conversation_id: &str) -> Result<(), StoreError> {
        let Some(entry) = self.conversations.get_mut(conversation_id) else {
            return Err(StoreError::UnknownConversation {
                conversation_id: conversation_id.to_owned(),
            });
        };
        if entry.holds_slot {
            return Ok(());
        }
        if !self.gate.try_acquire() {
            counter!("store_admission_rejected_total").increment(1);
            return Err(StoreError::StreamLimitReached {
                capacity: self.gate.capacity(),
            });
        }
        entry.holds_slot = true;
        entry.state.mark_connecting();
        Ok(())
    }

    /// Locally stop a conversation's stream: flush open buffers into
    /// incomplete entries, settle to `idle`, and release the slot.
    pub fn end_stream(&mut self, conversation_id: &str) -> Result<(), StoreError> {
        let Some(entry) = self.conversations.get_mut(conversation_id) else {
            return Err(StoreError::UnknownConversation {
                conversation_id: conversation_id.to_owned(),
            });
        };
        entry.state.abort_stream("stream stopped by caller");
        if entry.holds_slot {
            entry.holds_slot = false;
            self.gate.release();
        }
        Ok(())
    }

    /// Route one inbound event to its conversation's reducer.
    ///
    /// Unknown conversations are a drop-with-diagnostic, never an implicit
    /// open. A terminal event that ends the stream releases the admission
    /// slot here, so transport code cannot forget to.
    pub fn route(&mut self, event: ConversationEvent) -> Result<Applied, StoreError> {
        let Some(entry) = self.conversations.get_mut(event.conversation_id()) else {
            warn!(
                conversation_id = %event.conversation_id(),
                event_id = %event.id(),
                event_type = event.event_type(),
                "dropping event for conversation that is not open"
            );
            counter!("store_dropped_events_total").increment(1);
            return Err(StoreError::UnknownConversation {
                conversation_id: event.conversation_id().to_owned(),
            });
        };

        let applied = entry.state.apply(event);

        let streaming_now = entry.state.stream_status().holds_slot();
        if entry.holds_slot && !streaming_now {
            entry.holds_slot = false;
            self.gate.release();
        } else if !entry.holds_slot && streaming_now {
            // The stream went live without begin_stream — admission was
            // bypassed. Account for it anyway and surface the defect.
            warn!(
                conversation_id = %entry.state.conversation_id(),
                "stream became live without prior admission"
            );
            entry.holds_slot = self.gate.try_acquire();
        }
        Ok(applied)
    }

    /// Merge a backfill page into one conversation.
    pub fn merge_earlier(
        &mut self,
        conversation_id: &str,
        page: HistoryPage,
    ) -> Result<MergeOutcome, StoreError> {
        let Some(entry) = self.conversations.get_mut(conversation_id) else {
            return Err(StoreError::UnknownConversation {
                conversation_id: conversation_id.to_owned(),
            });
        };
        Ok(entry.state.merge_earlier(page))
    }

    /// Conversations currently holding a streaming slot.
    #[must_use]
    pub fn streaming_count(&self) -> usize {
        self.gate.active()
    }

    pub(crate) fn entry_state_mut(
        &mut self,
        conversation_id: &str,
    ) -> Result<&mut ConversationState, StoreError> {
        self.conversations
            .get_mut(conversation_id)
            .map(|entry| &mut entry.state)
            .ok_or_else(|| StoreError::UnknownConversation {
                conversation_id: conversation_id.to_owned(),
            })
    }
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new()
    }
}
