//! # weft-store
//!
//! Composition layer of the Weft engine: many conversations, one transport.
//!
//! - **Admission**: [`admission::StreamGate`] — an atomic counter capping
//!   simultaneously streaming conversations at
//!   [`admission::MAX_STREAMING_CONVERSATIONS`]. An admission check, not a
//!   scheduler: queuing policy belongs to the transport layer
//! - **Store**: [`store::ConversationStore`] — conversation id →
//!   [`weft_timeline::ConversationState`], with event routing that never
//!   auto-creates state and releases admission slots as streams end
//! - **Backfill driver**: [`history::HistoryClient`] — the async collaborator
//!   seam for paginated history fetches, driven by
//!   [`store::ConversationStore::backfill_earlier`]
//! - **Errors**: [`error::StoreError`] / [`error::HistoryError`]
//!
//! ## Crate Position
//!
//! Top of the engine stack. The only async surface lives here, at the
//! history-fetch seam; everything below is synchronous.

#![deny(unsafe_code)]

pub mod admission;
pub mod error;
pub mod history;
pub mod store;

pub use admission::{MAX_STREAMING_CONVERSATIONS, StreamGate};
pub use error::{HistoryError, StoreError};
pub use history::{HistoryClient, HistoryRequest};
pub use store::ConversationStore;
