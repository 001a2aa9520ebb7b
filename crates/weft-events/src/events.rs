//! The closed union of conversation event kinds.
//!
//! Every event on the wire is one of the [`ConversationEvent`] variants,
//! discriminated by the `type` field, with the [`EventMeta`] base fields
//! flattened alongside it. The union is closed: adding a kind is a single
//! edit inside the [`conversation_events!`] invocation, and exhaustive
//! matching forces every consumer to handle it.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::meta::{EventMeta, OrderKey};
use crate::payloads::{DecisionOption, FileChange, TaskItem, TaskStatus, UsageTotals};

/// The five event families.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    /// Agent run/turn lifecycle and terminal events.
    Agent,
    /// Messages and streamed text/thought content.
    Messaging,
    /// Human-in-the-loop request/response exchanges.
    HumanInLoop,
    /// Tool execution and sandbox lifecycle.
    Tooling,
    /// Connection, cost, tasks, and conversation metadata.
    System,
}

impl EventCategory {
    /// Short classification string for logging/metrics.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Agent => "agent",
            Self::Messaging => "messaging",
            Self::HumanInLoop => "human_in_loop",
            Self::Tooling => "tooling",
            Self::System => "system",
        }
    }
}

/// Declarative macro that generates [`ConversationEvent`], its accessor
/// methods, and [`ALL_EVENT_TYPES`].
///
/// Adding a new kind requires ONE edit (inside this invocation). The
/// compiler enforces exhaustive matching everywhere else.
macro_rules! conversation_events {
    ($(
        $category:ident {
            $(
                $(#[doc = $doc:literal])*
                $variant:ident {
                    $(
                        $(#[$fmeta:meta])*
                        $field:ident : $ty:ty
                    ),*
                    $(,)?
                } => $rename:literal
            ),* $(,)?
        }
    )*) => {
        /// A conversation event, tagged by wire `type`.
        ///
        /// Immutable once constructed. Rendering clients rely on the exact
        /// type strings and camelCase field names.
        #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
        #[serde(tag = "type")]
        #[allow(missing_docs)]
        pub enum ConversationEvent {
            $($(
                $(#[doc = $doc])*
                #[serde(rename = $rename)]
                $variant {
                    #[serde(flatten)]
                    meta: EventMeta,
                    $(
                        $(#[$fmeta])*
                        $field: $ty,
                    )*
                },
            )*)*
        }

        impl ConversationEvent {
            /// The base metadata fields.
            #[must_use]
            pub fn meta(&self) -> &EventMeta {
                match self {
                    $($(Self::$variant { meta, .. } => meta,)*)*
                }
            }

            /// The wire `type` string.
            #[must_use]
            pub fn event_type(&self) -> &'static str {
                match self {
                    $($(Self::$variant { .. } => $rename,)*)*
                }
            }

            /// The event family this kind belongs to.
            #[must_use]
            pub fn category(&self) -> EventCategory {
                match self {
                    $($(Self::$variant { .. } => EventCategory::$category,)*)*
                }
            }
        }

        /// Every wire `type` string, in declaration order.
        pub const ALL_EVENT_TYPES: &[&str] = &[$($($rename),*),*];
    };
}

conversation_events! {
    Agent {
        /// Agent run started processing.
        AgentStarted {} => "agent_started",

        /// Agent finished post-processing; safe to send the next message.
        AgentReady {} => "agent_ready",

        /// A turn began.
        TurnStarted {
            turn: u32,
        } => "turn_started",

        /// A turn finished, with its accounting.
        TurnCompleted {
            turn: u32,
            #[serde(rename = "durationMs")]
            duration_ms: u64,
            #[serde(skip_serializing_if = "Option::is_none")]
            usage: Option<UsageTotals>,
            #[serde(rename = "costUsd", skip_serializing_if = "Option::is_none")]
            cost_usd: Option<f64>,
        } => "turn_completed",

        /// Run completed successfully. Terminal.
        Completed {
            #[serde(rename = "stopReason", skip_serializing_if = "Option::is_none")]
            stop_reason: Option<String>,
        } => "completed",

        /// Run failed. Terminal.
        Error {
            message: String,
            #[serde(skip_serializing_if = "Option::is_none")]
            code: Option<String>,
            #[serde(skip_serializing_if = "Option::is_none")]
            recoverable: Option<bool>,
        } => "error",

        /// Run was cancelled. Terminal.
        Cancelled {
            #[serde(skip_serializing_if = "Option::is_none")]
            reason: Option<String>,
        } => "cancelled",

        /// A retryable failure occurred; a retry is about to happen.
        Retry {
            attempt: u32,
            #[serde(rename = "maxRetries")]
            max_retries: u32,
            #[serde(rename = "delayMs")]
            delay_ms: u64,
            reason: String,
        } => "retry",
    }

    Messaging {
        /// A complete user message.
        UserMessage {
            content: String,
            #[serde(rename = "imageCount", skip_serializing_if = "Option::is_none")]
            image_count: Option<u32>,
        } => "user_message",

        /// A complete assistant message.
        AssistantMessage {
            content: String,
            #[serde(skip_serializing_if = "Option::is_none")]
            model: Option<String>,
            #[serde(skip_serializing_if = "Option::is_none")]
            turn: Option<u32>,
        } => "assistant_message",

        /// A system-injected message.
        SystemMessage {
            content: String,
            #[serde(skip_serializing_if = "Option::is_none")]
            source: Option<String>,
        } => "system_message",

        /// A streamed text block opened.
        TextStart {
            #[serde(rename = "textId")]
            text_id: String,
        } => "text_start",

        /// Incremental text content for an open block.
        TextDelta {
            #[serde(rename = "textId")]
            text_id: String,
            delta: String,
        } => "text_delta",

        /// A streamed text block closed with its final content.
        TextEnd {
            #[serde(rename = "textId")]
            text_id: String,
            content: String,
            #[serde(skip_serializing_if = "Option::is_none")]
            incomplete: Option<bool>,
        } => "text_end",

        /// A complete agent thought.
        Thought {
            content: String,
            #[serde(skip_serializing_if = "Option::is_none")]
            incomplete: Option<bool>,
        } => "thought",

        /// Incremental agent thought content.
        ThoughtDelta {
            delta: String,
        } => "thought_delta",
    }

    HumanInLoop {
        /// The agent asked the user a clarifying question.
        ClarificationAsked {
            #[serde(rename = "requestId")]
            request_id: String,
            question: String,
            #[serde(skip_serializing_if = "Option::is_none")]
            context: Option<String>,
        } => "clarification_asked",

        /// The user's clarification answer round-tripped back.
        ClarificationAnswered {
            #[serde(rename = "requestId")]
            request_id: String,
            answer: String,
        } => "clarification_answered",

        /// The agent asked the user to pick between options.
        DecisionAsked {
            #[serde(rename = "requestId")]
            request_id: String,
            prompt: String,
            options: Vec<DecisionOption>,
        } => "decision_asked",

        /// The user's decision round-tripped back.
        DecisionMade {
            #[serde(rename = "requestId")]
            request_id: String,
            choice: String,
        } => "decision_made",

        /// The agent requested permission for an action.
        PermissionAsked {
            #[serde(rename = "requestId")]
            request_id: String,
            #[serde(rename = "toolName")]
            tool_name: String,
            description: String,
        } => "permission_asked",

        /// The user's permission reply round-tripped back.
        PermissionReplied {
            #[serde(rename = "requestId")]
            request_id: String,
            approved: bool,
            #[serde(skip_serializing_if = "Option::is_none")]
            remember: Option<bool>,
        } => "permission_replied",

        /// The agent requested environment variable values.
        EnvVarRequested {
            #[serde(rename = "requestId")]
            request_id: String,
            names: Vec<String>,
            #[serde(skip_serializing_if = "Option::is_none")]
            reason: Option<String>,
        } => "env_var_requested",

        /// The user provided the requested variables (names only; values
        /// never echo through the event stream).
        EnvVarProvided {
            #[serde(rename = "requestId")]
            request_id: String,
            names: Vec<String>,
        } => "env_var_provided",

        /// A repetitive, non-progressing action pattern was detected.
        DoomLoopDetected {
            #[serde(rename = "requestId")]
            request_id: String,
            pattern: String,
            repetitions: u32,
        } => "doom_loop_detected",

        /// The detected loop was addressed (automatically or by the user).
        DoomLoopIntervened {
            #[serde(rename = "requestId")]
            request_id: String,
            action: String,
        } => "doom_loop_intervened",
    }

    Tooling {
        /// A tool call began.
        Act {
            #[serde(rename = "toolCallId")]
            tool_call_id: String,
            #[serde(rename = "toolName")]
            tool_name: String,
            #[serde(skip_serializing_if = "Option::is_none")]
            arguments: Option<Value>,
        } => "act",

        /// Incremental tool-call argument JSON.
        ActDelta {
            #[serde(rename = "toolCallId")]
            tool_call_id: String,
            #[serde(rename = "argumentsDelta")]
            arguments_delta: String,
        } => "act_delta",

        /// Tool execution progress; confirms a preparing call is running.
        ToolUpdate {
            #[serde(rename = "toolCallId")]
            tool_call_id: String,
            update: String,
        } => "tool_update",

        /// A tool call finished.
        Observe {
            #[serde(rename = "toolCallId")]
            tool_call_id: String,
            success: bool,
            #[serde(skip_serializing_if = "Option::is_none")]
            output: Option<String>,
            #[serde(skip_serializing_if = "Option::is_none")]
            error: Option<String>,
        } => "observe",

        /// Execution sandbox was provisioned.
        SandboxCreated {
            #[serde(rename = "sandboxId")]
            sandbox_id: String,
        } => "sandbox_created",

        /// Sandbox is ready to execute.
        SandboxReady {
            #[serde(rename = "sandboxId")]
            sandbox_id: String,
        } => "sandbox_ready",

        /// Sandbox failed.
        SandboxError {
            #[serde(rename = "sandboxId")]
            sandbox_id: String,
            message: String,
        } => "sandbox_error",

        /// Sandbox was torn down.
        SandboxTerminated {
            #[serde(rename = "sandboxId")]
            sandbox_id: String,
        } => "sandbox_terminated",

        /// A workspace file changed.
        FileChanged {
            path: String,
            change: FileChange,
        } => "file_changed",

        /// The agent produced a downloadable artifact.
        ArtifactCreated {
            path: String,
            #[serde(skip_serializing_if = "Option::is_none")]
            kind: Option<String>,
        } => "artifact_created",
    }

    System {
        /// The event stream for this conversation is live.
        Connected {} => "connected",

        /// Keepalive. Never materialized.
        Heartbeat {} => "heartbeat",

        /// Accumulated cost changed.
        CostUpdated {
            #[serde(rename = "totalUsd")]
            total_usd: f64,
        } => "cost_updated",

        /// Token totals changed.
        UsageUpdated {
            usage: UsageTotals,
        } => "usage_updated",

        /// Follow-up suggestions refreshed.
        SuggestionsUpdated {
            suggestions: Vec<String>,
        } => "suggestions_updated",

        /// Task checklist replaced wholesale.
        TasksUpdated {
            tasks: Vec<TaskItem>,
        } => "tasks_updated",

        /// One checklist entry changed status.
        TaskStatusChanged {
            #[serde(rename = "taskId")]
            task_id: String,
            status: TaskStatus,
        } => "task_status_changed",

        /// External application context was injected.
        ContextInjected {
            source: String,
            content: Value,
        } => "context_injected",

        /// A persistence snapshot was written.
        SnapshotSaved {} => "snapshot_saved",

        /// Conversation metadata changed.
        ConversationUpdated {
            #[serde(skip_serializing_if = "Option::is_none")]
            title: Option<String>,
            #[serde(skip_serializing_if = "Option::is_none")]
            model: Option<String>,
        } => "conversation_updated",
    }
}

impl ConversationEvent {
    /// The event instance id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.meta().id
    }

    /// The conversation this event routes to.
    #[must_use]
    pub fn conversation_id(&self) -> &str {
        &self.meta().conversation_id
    }

    /// The timeline ordering key.
    #[must_use]
    pub fn order_key(&self) -> OrderKey {
        self.meta().order_key()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn meta(counter: i64) -> EventMeta {
        EventMeta {
            id: format!("evt_{counter}"),
            conversation_id: "conv_1".into(),
            event_time_us: 1_700_000_000_000_000 + counter,
            event_counter: counter,
        }
    }

    #[test]
    fn event_type_strings_are_unique() {
        let mut types: Vec<&str> = ALL_EVENT_TYPES.to_vec();
        types.sort_unstable();
        types.dedup();
        assert_eq!(types.len(), ALL_EVENT_TYPES.len());
    }

    #[test]
    fn closed_set_has_expected_size() {
        assert_eq!(ALL_EVENT_TYPES.len(), 46);
    }

    #[test]
    fn user_message_wire_shape() {
        let e = ConversationEvent::UserMessage {
            meta: meta(1),
            content: "hi".into(),
            image_count: None,
        };
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["type"], "user_message");
        assert_eq!(json["conversationId"], "conv_1");
        assert_eq!(json["eventCounter"], 1);
        assert_eq!(json["content"], "hi");
        assert!(json.get("imageCount").is_none());
    }

    #[test]
    fn text_delta_round_trip() {
        let e = ConversationEvent::TextDelta {
            meta: meta(2),
            text_id: "t1".into(),
            delta: "Hel".into(),
        };
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["type"], "text_delta");
        assert_eq!(json["textId"], "t1");
        let back: ConversationEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, e);
    }

    #[test]
    fn act_carries_optional_arguments() {
        let e = ConversationEvent::Act {
            meta: meta(3),
            tool_call_id: "call_1".into(),
            tool_name: "search".into(),
            arguments: Some(json!({"query": "rust"})),
        };
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["toolCallId"], "call_1");
        assert_eq!(json["toolName"], "search");
        assert_eq!(json["arguments"]["query"], "rust");
    }

    #[test]
    fn observe_wire_shape() {
        let e = ConversationEvent::Observe {
            meta: meta(4),
            tool_call_id: "call_1".into(),
            success: true,
            output: Some("42".into()),
            error: None,
        };
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["type"], "observe");
        assert!(json["success"].as_bool().unwrap());
        assert_eq!(json["output"], "42");
        assert!(json.get("error").is_none());
    }

    #[test]
    fn clarification_asked_wire_shape() {
        let e = ConversationEvent::ClarificationAsked {
            meta: meta(5),
            request_id: "req_1".into(),
            question: "Which branch?".into(),
            context: None,
        };
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["type"], "clarification_asked");
        assert_eq!(json["requestId"], "req_1");
    }

    #[test]
    fn decision_asked_round_trip() {
        let e = ConversationEvent::DecisionAsked {
            meta: meta(6),
            request_id: "req_2".into(),
            prompt: "Proceed?".into(),
            options: vec![
                DecisionOption {
                    id: "yes".into(),
                    label: "Yes".into(),
                    description: None,
                },
                DecisionOption {
                    id: "no".into(),
                    label: "No".into(),
                    description: Some("Stop here".into()),
                },
            ],
        };
        let json = serde_json::to_value(&e).unwrap();
        let back: ConversationEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, e);
    }

    #[test]
    fn unknown_type_fails_to_parse() {
        let json = json!({
            "type": "not_a_real_event",
            "id": "evt_x",
            "conversationId": "conv_1",
            "eventTimeUs": 1,
            "eventCounter": 1,
        });
        assert!(serde_json::from_value::<ConversationEvent>(json).is_err());
    }

    #[test]
    fn missing_ordering_fields_fail_to_parse() {
        let json = json!({
            "type": "heartbeat",
            "id": "evt_x",
            "conversationId": "conv_1",
        });
        assert!(serde_json::from_value::<ConversationEvent>(json).is_err());
    }

    #[test]
    fn categories_cover_all_families() {
        let e = ConversationEvent::Completed {
            meta: meta(7),
            stop_reason: None,
        };
        assert_eq!(e.category(), EventCategory::Agent);

        let e = ConversationEvent::Thought {
            meta: meta(8),
            content: "hm".into(),
            incomplete: None,
        };
        assert_eq!(e.category(), EventCategory::Messaging);

        let e = ConversationEvent::PermissionAsked {
            meta: meta(9),
            request_id: "req".into(),
            tool_name: "bash".into(),
            description: "run".into(),
        };
        assert_eq!(e.category(), EventCategory::HumanInLoop);

        let e = ConversationEvent::SandboxReady {
            meta: meta(10),
            sandbox_id: "sb_1".into(),
        };
        assert_eq!(e.category(), EventCategory::Tooling);

        let e = ConversationEvent::Heartbeat { meta: meta(11) };
        assert_eq!(e.category(), EventCategory::System);
    }

    #[test]
    fn accessors_delegate_to_meta() {
        let e = ConversationEvent::Connected { meta: meta(12) };
        assert_eq!(e.id(), "evt_12");
        assert_eq!(e.conversation_id(), "conv_1");
        assert_eq!(e.event_type(), "connected");
        assert_eq!(e.order_key().counter, 12);
    }

    #[test]
    fn category_as_str() {
        assert_eq!(EventCategory::HumanInLoop.as_str(), "human_in_loop");
        assert_eq!(EventCategory::Tooling.as_str(), "tooling");
    }
}
