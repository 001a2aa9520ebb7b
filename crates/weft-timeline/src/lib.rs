//! # weft-timeline
//!
//! The per-conversation state machine of the Weft engine: reduces one ordered
//! stream of [`weft_events::ConversationEvent`]s into a renderable
//! [`state::ConversationState`] snapshot.
//!
//! - **Reducer**: [`state::ConversationState::apply`] — pure in
//!   `(state, event)`, replayable from a persisted log; each call reports its
//!   disposition as a [`reduce::Applied`]
//! - **Timeline**: [`timeline::Timeline`] — ordered by
//!   `(eventTimeUs, eventCounter)`, deduplicated by event id, append-only
//!   live and prepend-only for backfill
//! - **Agent machine**: [`agent::AgentPhase`] — event-driven, no timers,
//!   no terminal state
//! - **HITL**: [`hitl::PendingRequests`] — four independent pending slots,
//!   first-pending-wins, summarized by a pure precedence projection
//! - **Backfill**: [`backfill::HistoryPage`] merge that never disturbs live
//!   streaming state
//!
//! ## Crate Position
//!
//! Sits between `weft-events` (the vocabulary) and `weft-store` (the
//! multi-conversation composition). Fully synchronous; the reducer never
//! reads the clock and never performs I/O.

#![deny(unsafe_code)]

pub mod agent;
pub mod backfill;
pub mod hitl;
pub mod reduce;
pub mod state;
pub mod timeline;

pub use agent::AgentPhase;
pub use backfill::{HistoryPage, MergeOutcome};
pub use hitl::{DoomLoopAlert, HitlKind, HitlSummary, PendingRequests};
pub use reduce::Applied;
pub use state::{ActiveToolCall, ConversationState, StreamStatus, ToolCallStatus};
pub use timeline::Timeline;
