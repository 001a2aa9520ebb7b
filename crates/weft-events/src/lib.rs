//! # weft-events
//!
//! The typed event vocabulary of the Weft conversation timeline engine.
//!
//! A conversation is driven by a single ordered stream of
//! [`ConversationEvent`]s delivered over a persistent connection. This crate
//! owns the closed union of event kinds and the pure predicates over them:
//!
//! - **Metadata**: [`meta::EventMeta`] (identity, routing, ordering fields)
//!   and [`meta::OrderKey`], the `(eventTimeUs, eventCounter)` timeline key
//! - **Events**: [`events::ConversationEvent`], one variant per wire `type`,
//!   grouped into five [`events::EventCategory`] families
//! - **Classifiers**: delta/terminal/human-input/save-trigger/cost predicates
//!   in [`classify`], consumed by the reducer and the transport flush policy
//! - **Payloads**: shared payload structs in [`payloads`]
//!
//! ## Crate Position
//!
//! Foundation crate. Depended on by `weft-timeline` and `weft-store`.
//! Pure data and pure functions — no I/O, no clock reads outside the
//! producer-side [`meta::EventMeta::new`] helper.

#![deny(unsafe_code)]

pub mod classify;
pub mod events;
pub mod meta;
pub mod payloads;

pub use events::{ALL_EVENT_TYPES, ConversationEvent, EventCategory};
pub use meta::{EventMeta, OrderKey};
pub use payloads::{DecisionOption, FileChange, TaskItem, TaskStatus, UsageTotals};
