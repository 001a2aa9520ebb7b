//! The agent execution phase machine.

use serde::{Deserialize, Serialize};

/// What the agent is doing right now, as far as the event stream shows.
///
/// Transitions are event-driven, never timer-driven: thought content moves to
/// `thinking`, a tool call to `preparing`/`acting`, a result to `observing`,
/// any pending HITL request to `awaiting_input` (which overrides everything —
/// human input blocks progress), a retry to `retrying`, and any terminal
/// event back to `idle`. There is no terminal phase; conversations are
/// long-lived and cycle indefinitely.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentPhase {
    /// Nothing in flight.
    #[default]
    Idle,
    /// Streaming or producing a thought.
    Thinking,
    /// Constructing a tool call (arguments still streaming).
    Preparing,
    /// A tool call is confirmed executing.
    Acting,
    /// A tool result arrived and is being incorporated.
    Observing,
    /// Blocked on a pending human-in-the-loop request.
    AwaitingInput,
    /// A retryable failure occurred; the backend is about to retry.
    Retrying,
}

impl AgentPhase {
    /// Short classification string for logging/metrics.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Thinking => "thinking",
            Self::Preparing => "preparing",
            Self::Acting => "acting",
            Self::Observing => "observing",
            Self::AwaitingInput => "awaiting_input",
            Self::Retrying => "retrying",
        }
    }
}
