//! Event metadata: identity, routing, and ordering fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Timeline ordering key: `(eventTimeUs, eventCounter)` ascending.
///
/// The counter breaks ties between events sharing a microsecond timestamp.
/// Event ids never participate in ordering — they are dedup-only.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderKey {
    /// Microsecond server timestamp.
    pub time_us: i64,
    /// Monotonic tie-breaker within a conversation.
    pub counter: i64,
}

impl OrderKey {
    /// Largest possible key — the "fetch from the end" backfill sentinel.
    pub const MAX: Self = Self {
        time_us: i64::MAX,
        counter: i64::MAX,
    };

    /// Create a key from its parts.
    #[must_use]
    pub fn new(time_us: i64, counter: i64) -> Self {
        Self { time_us, counter }
    }
}

/// Common fields carried by every event.
///
/// Flattened into each [`crate::ConversationEvent`] variant, so the wire shape
/// has `id`/`conversationId`/`eventTimeUs`/`eventCounter` at the top level
/// next to the `type` tag.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMeta {
    /// Unique per event instance (not per logical entity).
    pub id: String,
    /// Conversation this event belongs to — the routing key.
    pub conversation_id: String,
    /// Microsecond server timestamp.
    pub event_time_us: i64,
    /// Monotonic tie-breaker for same-timestamp events.
    pub event_counter: i64,
}

impl EventMeta {
    /// Mint metadata with a fresh `evt_`-prefixed UUIDv7 id.
    ///
    /// Producer/test helper only — the reducer never creates events.
    #[must_use]
    pub fn new(
        conversation_id: impl Into<String>,
        event_time_us: i64,
        event_counter: i64,
    ) -> Self {
        Self {
            id: format!("evt_{}", Uuid::now_v7()),
            conversation_id: conversation_id.into(),
            event_time_us,
            event_counter,
        }
    }

    /// The timeline ordering key.
    #[must_use]
    pub fn order_key(&self) -> OrderKey {
        OrderKey::new(self.event_time_us, self.event_counter)
    }

    /// Server timestamp as UTC wall-clock time.
    ///
    /// `None` only for timestamps outside the representable chrono range.
    #[must_use]
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_micros(self.event_time_us)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_key_sorts_by_time_then_counter() {
        let a = OrderKey::new(100, 5);
        let b = OrderKey::new(100, 6);
        let c = OrderKey::new(101, 0);
        assert!(a < b);
        assert!(b < c);
        assert!(a < c);
    }

    #[test]
    fn order_key_max_is_upper_bound() {
        let k = OrderKey::new(i64::MAX - 1, i64::MAX);
        assert!(k < OrderKey::MAX);
    }

    #[test]
    fn meta_new_mints_prefixed_id() {
        let meta = EventMeta::new("conv_1", 1_000, 1);
        assert!(meta.id.starts_with("evt_"));
        assert_eq!(meta.conversation_id, "conv_1");
        assert_eq!(meta.order_key(), OrderKey::new(1_000, 1));
    }

    #[test]
    fn meta_ids_are_unique() {
        let a = EventMeta::new("c", 0, 0);
        let b = EventMeta::new("c", 0, 0);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn meta_serde_camel_case() {
        let meta = EventMeta {
            id: "evt_1".into(),
            conversation_id: "conv_1".into(),
            event_time_us: 1_700_000_000_000_000,
            event_counter: 42,
        };
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["id"], "evt_1");
        assert_eq!(json["conversationId"], "conv_1");
        assert_eq!(json["eventTimeUs"], 1_700_000_000_000_000_i64);
        assert_eq!(json["eventCounter"], 42);

        let back: EventMeta = serde_json::from_value(json).unwrap();
        assert_eq!(back, meta);
    }

    #[test]
    fn timestamp_converts_micros() {
        let meta = EventMeta::new("c", 1_700_000_000_000_000, 0);
        let ts = meta.timestamp().unwrap();
        assert_eq!(ts.timestamp(), 1_700_000_000);
    }
}
