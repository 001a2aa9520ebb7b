//! Pure classification predicates over event kinds.
//!
//! Consumed by the reducer (delta buffering, terminal handling, HITL slots)
//! and by the transport layer's flush/batch policy (save triggers, cost
//! refresh). No predicate inspects payload contents — classification is a
//! function of the `type` alone.

use crate::events::ConversationEvent;

impl ConversationEvent {
    /// Incremental fragment of a larger piece of content (text, thought, or
    /// tool arguments). Deltas are accumulated into buffers and never appear
    /// alone in the materialized timeline.
    #[must_use]
    pub fn is_delta(&self) -> bool {
        matches!(
            self,
            Self::TextDelta { .. } | Self::ThoughtDelta { .. } | Self::ActDelta { .. }
        )
    }

    /// Completion, error, or cancellation. Terminal events close every open
    /// streaming buffer and flip the stream status to not-streaming.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed { .. } | Self::Error { .. } | Self::Cancelled { .. }
        )
    }

    /// One of the four HITL "asked/requested" kinds. These populate a pending
    /// slot and must not be dropped even when the conversation is not
    /// currently rendered.
    #[must_use]
    pub fn requires_human_input(&self) -> bool {
        matches!(
            self,
            Self::ClarificationAsked { .. }
                | Self::DecisionAsked { .. }
                | Self::PermissionAsked { .. }
                | Self::EnvVarRequested { .. }
        )
    }

    /// Advisory flag for the transport layer: a snapshot save is worthwhile
    /// after this event. Not consulted by the reducer.
    #[must_use]
    pub fn is_save_trigger(&self) -> bool {
        self.is_terminal()
            || self.requires_human_input()
            || matches!(
                self,
                Self::UserMessage { .. }
                    | Self::AssistantMessage { .. }
                    | Self::Observe { .. }
                    | Self::ClarificationAnswered { .. }
                    | Self::DecisionMade { .. }
                    | Self::PermissionReplied { .. }
                    | Self::EnvVarProvided { .. }
                    | Self::TasksUpdated { .. }
                    | Self::ConversationUpdated { .. }
            )
    }

    /// Advisory flag for the transport layer: displayed cost should refresh
    /// after this event. Not consulted by the reducer.
    #[must_use]
    pub fn is_cost_relevant(&self) -> bool {
        matches!(
            self,
            Self::CostUpdated { .. } | Self::UsageUpdated { .. } | Self::TurnCompleted { .. }
        )
    }

    /// Never materialized in the timeline: block-open markers, deltas, and
    /// keepalives exist only to drive buffers and liveness.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.is_delta() || matches!(self, Self::TextStart { .. } | Self::Heartbeat { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::EventMeta;

    fn meta() -> EventMeta {
        EventMeta {
            id: "evt_1".into(),
            conversation_id: "conv_1".into(),
            event_time_us: 1,
            event_counter: 1,
        }
    }

    fn delta_events() -> Vec<ConversationEvent> {
        vec![
            ConversationEvent::TextDelta {
                meta: meta(),
                text_id: "t1".into(),
                delta: "x".into(),
            },
            ConversationEvent::ThoughtDelta {
                meta: meta(),
                delta: "y".into(),
            },
            ConversationEvent::ActDelta {
                meta: meta(),
                tool_call_id: "call_1".into(),
                arguments_delta: "{".into(),
            },
        ]
    }

    fn terminal_events() -> Vec<ConversationEvent> {
        vec![
            ConversationEvent::Completed {
                meta: meta(),
                stop_reason: None,
            },
            ConversationEvent::Error {
                meta: meta(),
                message: "boom".into(),
                code: None,
                recoverable: None,
            },
            ConversationEvent::Cancelled {
                meta: meta(),
                reason: None,
            },
        ]
    }

    #[test]
    fn exactly_three_delta_kinds() {
        for e in delta_events() {
            assert!(e.is_delta(), "{} should be a delta", e.event_type());
            assert!(e.is_transient());
        }
        let e = ConversationEvent::TextEnd {
            meta: meta(),
            text_id: "t1".into(),
            content: "done".into(),
            incomplete: None,
        };
        assert!(!e.is_delta());
    }

    #[test]
    fn exactly_three_terminal_kinds() {
        for e in terminal_events() {
            assert!(e.is_terminal(), "{} should be terminal", e.event_type());
        }
        let e = ConversationEvent::AgentReady { meta: meta() };
        assert!(!e.is_terminal());
    }

    #[test]
    fn terminal_and_delta_are_disjoint() {
        for e in delta_events() {
            assert!(!e.is_terminal());
        }
        for e in terminal_events() {
            assert!(!e.is_delta());
        }
    }

    #[test]
    fn four_kinds_require_human_input() {
        let asked = vec![
            ConversationEvent::ClarificationAsked {
                meta: meta(),
                request_id: "r".into(),
                question: "?".into(),
                context: None,
            },
            ConversationEvent::DecisionAsked {
                meta: meta(),
                request_id: "r".into(),
                prompt: "?".into(),
                options: vec![],
            },
            ConversationEvent::PermissionAsked {
                meta: meta(),
                request_id: "r".into(),
                tool_name: "bash".into(),
                description: "run".into(),
            },
            ConversationEvent::EnvVarRequested {
                meta: meta(),
                request_id: "r".into(),
                names: vec!["API_KEY".into()],
                reason: None,
            },
        ];
        for e in asked {
            assert!(e.requires_human_input(), "{}", e.event_type());
            assert!(e.is_save_trigger(), "asks must persist: {}", e.event_type());
        }
        // Replies and doom-loop records do not block on input themselves.
        let e = ConversationEvent::DoomLoopDetected {
            meta: meta(),
            request_id: "r".into(),
            pattern: "edit/revert".into(),
            repetitions: 4,
        };
        assert!(!e.requires_human_input());
    }

    #[test]
    fn messages_and_results_trigger_saves() {
        let e = ConversationEvent::UserMessage {
            meta: meta(),
            content: "hi".into(),
            image_count: None,
        };
        assert!(e.is_save_trigger());
        let e = ConversationEvent::Heartbeat { meta: meta() };
        assert!(!e.is_save_trigger());
    }

    #[test]
    fn cost_relevant_kinds() {
        let e = ConversationEvent::CostUpdated {
            meta: meta(),
            total_usd: 0.25,
        };
        assert!(e.is_cost_relevant());
        let e = ConversationEvent::TurnCompleted {
            meta: meta(),
            turn: 1,
            duration_ms: 100,
            usage: None,
            cost_usd: None,
        };
        assert!(e.is_cost_relevant());
        let e = ConversationEvent::Connected { meta: meta() };
        assert!(!e.is_cost_relevant());
    }

    #[test]
    fn transient_kinds_never_materialize() {
        let e = ConversationEvent::TextStart {
            meta: meta(),
            text_id: "t1".into(),
        };
        assert!(e.is_transient());
        let e = ConversationEvent::Heartbeat { meta: meta() };
        assert!(e.is_transient());
        let e = ConversationEvent::Connected { meta: meta() };
        assert!(!e.is_transient());
    }
}
