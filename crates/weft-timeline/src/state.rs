//! Per-conversation state: the reducer's output snapshot.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use serde_json::Value;
use weft_events::{OrderKey, TaskItem, UsageTotals};

use crate::agent::AgentPhase;
use crate::hitl::{DoomLoopAlert, HitlSummary, PendingRequests};
use crate::timeline::Timeline;

/// Connection status of the conversation's event stream.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamStatus {
    /// No stream attached.
    #[default]
    Idle,
    /// Admission granted, connection being established.
    Connecting,
    /// Events are flowing.
    Streaming,
    /// The stream ended with an error.
    Error,
}

impl StreamStatus {
    /// Whether this status occupies a streaming-admission slot.
    #[must_use]
    pub fn holds_slot(self) -> bool {
        matches!(self, Self::Connecting | Self::Streaming)
    }
}

/// Lifecycle status of a tracked tool call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallStatus {
    /// Announced; arguments still streaming.
    Preparing,
    /// Confirmed executing.
    Running,
    /// Finished successfully.
    Success,
    /// Finished with an error (or was interrupted).
    Failed,
}

/// One tracked tool call, keyed by `toolCallId`.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveToolCall {
    /// Correlation id.
    pub tool_call_id: String,
    /// Tool name.
    pub tool_name: String,
    /// Lifecycle status.
    pub status: ToolCallStatus,
    /// Microsecond timestamp of the `act` event.
    pub started_at_us: i64,
    /// Microsecond timestamp of the `observe` event (or interruption).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at_us: Option<i64>,
    /// `ended_at_us - started_at_us`, once ended.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_us: Option<i64>,
    /// Accumulated argument JSON fragments (while preparing).
    pub partial_arguments: String,
    /// Final arguments, when the `act` carried them complete.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Value>,
    /// Most recent progress update.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_update: Option<String>,
    /// Result output on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    /// Error description on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One name on the in-flight tool stack.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingTool {
    /// Correlation id — stack entries pop by identity, not position.
    pub tool_call_id: String,
    /// Tool name for display.
    pub tool_name: String,
}

/// An open streamed-text block.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextBuffer {
    /// Block correlation id.
    pub text_id: String,
    /// Accumulated provisional content.
    pub content: String,
    /// Ordering key of the `text_start` event.
    pub opened_at: OrderKey,
}

/// Cost and token accounting. Backend-authoritative; last write wins.
#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CostTracker {
    /// Latest token totals.
    pub usage: UsageTotals,
    /// Latest accumulated cost in USD.
    pub total_usd: f64,
}

/// Lifecycle phase of the execution sandbox.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SandboxPhase {
    /// Provisioned, not yet ready.
    Created,
    /// Ready to execute.
    Ready,
    /// Failed.
    Error,
    /// Torn down.
    Terminated,
}

/// Latest known sandbox state.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SandboxState {
    /// Sandbox id.
    pub sandbox_id: String,
    /// Lifecycle phase.
    pub phase: SandboxPhase,
    /// Error message, when phase is `error`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Conversation metadata pushed by the backend.
#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationMeta {
    /// Display title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Model in use.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// External application context injected into the conversation.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InjectedContext {
    /// Which application injected it.
    pub source: String,
    /// Opaque context payload.
    pub content: Value,
}

/// Full state of one open conversation.
///
/// Created empty when a conversation is opened; mutated exclusively by
/// [`apply`](ConversationState::apply) (live events) and
/// [`merge_earlier`](ConversationState::merge_earlier) (backfill); read by
/// rendering layers through the accessors or a serialized snapshot.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationState {
    pub(crate) conversation_id: String,
    pub(crate) timeline: Timeline,
    pub(crate) has_earlier: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) earliest_time_us: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) earliest_counter: Option<i64>,
    pub(crate) stream_status: StreamStatus,
    pub(crate) text_buffers: HashMap<String, TextBuffer>,
    pub(crate) thought_buffer: String,
    pub(crate) is_thinking_streaming: bool,
    pub(crate) agent_phase: AgentPhase,
    #[serde(skip)]
    pub(crate) phase_before_input: Option<AgentPhase>,
    pub(crate) tool_calls: HashMap<String, ActiveToolCall>,
    pub(crate) pending_tools: Vec<PendingTool>,
    pub(crate) pending: PendingRequests,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) doom_loop: Option<DoomLoopAlert>,
    pub(crate) cost: CostTracker,
    pub(crate) turn: u32,
    pub(crate) tasks: Vec<TaskItem>,
    pub(crate) suggestions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) app_context: Option<InjectedContext>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) sandbox: Option<SandboxState>,
    pub(crate) metadata: ConversationMeta,
    #[serde(skip)]
    pub(crate) latest_live_key: Option<OrderKey>,
    #[serde(skip)]
    pub(crate) live_ids: HashSet<String>,
}

impl ConversationState {
    /// Create the empty state for a newly opened conversation.
    #[must_use]
    pub fn new(conversation_id: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            timeline: Timeline::new(),
            has_earlier: false,
            earliest_time_us: None,
            earliest_counter: None,
            stream_status: StreamStatus::Idle,
            text_buffers: HashMap::new(),
            thought_buffer: String::new(),
            is_thinking_streaming: false,
            agent_phase: AgentPhase::Idle,
            phase_before_input: None,
            tool_calls: HashMap::new(),
            pending_tools: Vec::new(),
            pending: PendingRequests::default(),
            doom_loop: None,
            cost: CostTracker::default(),
            turn: 0,
            tasks: Vec::new(),
            suggestions: Vec::new(),
            app_context: None,
            sandbox: None,
            metadata: ConversationMeta::default(),
            latest_live_key: None,
            live_ids: HashSet::new(),
        }
    }

    /// The conversation this state belongs to.
    #[must_use]
    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    /// The materialized timeline.
    #[must_use]
    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    /// Whether older history remains to backfill.
    #[must_use]
    pub fn has_earlier(&self) -> bool {
        self.has_earlier
    }

    /// Current stream status.
    #[must_use]
    pub fn stream_status(&self) -> StreamStatus {
        self.stream_status
    }

    /// Current agent phase.
    #[must_use]
    pub fn agent_phase(&self) -> AgentPhase {
        self.agent_phase
    }

    /// Provisional content of an open text block.
    #[must_use]
    pub fn streaming_text(&self, text_id: &str) -> Option<&str> {
        self.text_buffers.get(text_id).map(|b| b.content.as_str())
    }

    /// All open text blocks, in opening order.
    #[must_use]
    pub fn streaming_texts(&self) -> Vec<&TextBuffer> {
        let mut buffers: Vec<&TextBuffer> = self.text_buffers.values().collect();
        buffers.sort_by_key(|b| b.opened_at);
        buffers
    }

    /// Provisional agent thought, if one is streaming.
    #[must_use]
    pub fn streaming_thought(&self) -> Option<&str> {
        if self.thought_buffer.is_empty() {
            None
        } else {
            Some(&self.thought_buffer)
        }
    }

    /// Whether a thought stream is currently open.
    #[must_use]
    pub fn is_thinking_streaming(&self) -> bool {
        self.is_thinking_streaming
    }

    /// A tracked tool call by correlation id.
    #[must_use]
    pub fn tool_call(&self, tool_call_id: &str) -> Option<&ActiveToolCall> {
        self.tool_calls.get(tool_call_id)
    }

    /// All tracked tool calls.
    #[must_use]
    pub fn tool_calls(&self) -> &HashMap<String, ActiveToolCall> {
        &self.tool_calls
    }

    /// Names of in-flight tool calls, oldest first.
    #[must_use]
    pub fn pending_tool_names(&self) -> Vec<&str> {
        self.pending_tools.iter().map(|t| t.tool_name.as_str()).collect()
    }

    /// The raw HITL pending slots.
    #[must_use]
    pub fn pending_requests(&self) -> &PendingRequests {
        &self.pending
    }

    /// The single UI-facing HITL summary (pure projection; see
    /// [`PendingRequests::summary`]).
    #[must_use]
    pub fn hitl_summary(&self) -> Option<HitlSummary> {
        self.pending.summary()
    }

    /// The unaddressed doom-loop detection, if any.
    #[must_use]
    pub fn doom_loop(&self) -> Option<&DoomLoopAlert> {
        self.doom_loop.as_ref()
    }

    /// Cost and token accounting.
    #[must_use]
    pub fn cost(&self) -> &CostTracker {
        &self.cost
    }

    /// Latest turn number seen.
    #[must_use]
    pub fn turn(&self) -> u32 {
        self.turn
    }

    /// The agent's task checklist.
    #[must_use]
    pub fn tasks(&self) -> &[TaskItem] {
        &self.tasks
    }

    /// Follow-up suggestions.
    #[must_use]
    pub fn suggestions(&self) -> &[String] {
        &self.suggestions
    }

    /// Injected external app context, if any.
    #[must_use]
    pub fn app_context(&self) -> Option<&InjectedContext> {
        self.app_context.as_ref()
    }

    /// Latest sandbox state, if any.
    #[must_use]
    pub fn sandbox(&self) -> Option<&SandboxState> {
        self.sandbox.as_ref()
    }

    /// Conversation metadata.
    #[must_use]
    pub fn metadata(&self) -> &ConversationMeta {
        &self.metadata
    }

    /// Ordering key of the newest live event applied.
    #[must_use]
    pub fn latest_live_key(&self) -> Option<OrderKey> {
        self.latest_live_key
    }

    /// Mark the stream admitted and connecting.
    ///
    /// Called by the store once an admission slot is granted; the stream
    /// flips to `streaming` when the `connected` event arrives.
    pub fn mark_connecting(&mut self) {
        self.stream_status = StreamStatus::Connecting;
    }
}
