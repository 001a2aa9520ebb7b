//! The per-conversation reducer: one event in, the next state out.
//!
//! [`ConversationState::apply`] is pure in `(state, event)`: no clock reads,
//! no I/O, so any state is replayable from a persisted event log. It never
//! fails — malformed-but-parseable input degrades to timeline-only
//! visibility, and every anomaly is surfaced through the returned
//! [`Applied`] disposition plus structured logs and counters.

use metrics::counter;
use tracing::{debug, warn};
use weft_events::{ConversationEvent, EventMeta, OrderKey};

use crate::agent::AgentPhase;
use crate::hitl::{
    DoomLoopAlert, PendingClarification, PendingDecision, PendingEnvVar, PendingPermission,
};
use crate::state::{
    ActiveToolCall, ConversationState, PendingTool, SandboxPhase, SandboxState, StreamStatus,
    TextBuffer, ToolCallStatus,
};

/// Disposition of one reduced event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Applied {
    /// Materialized in the timeline.
    Appended,
    /// Folded into a streaming buffer.
    Buffered,
    /// Consumed without materializing (block markers, keepalives).
    Transient,
    /// Dropped: the event id was already applied.
    Duplicate,
    /// Rejected: the ordering key regressed on the live path.
    OutOfOrder,
    /// Correlation id resolved to nothing; appended as a timeline-only
    /// orphan record.
    OrphanAppended,
}

impl ConversationState {
    /// Reduce one live event into this state.
    ///
    /// Events must arrive in `(eventTimeUs, eventCounter)` order — the
    /// transport owns sequencing. A regression is rejected and surfaced,
    /// never silently resequenced.
    pub fn apply(&mut self, event: ConversationEvent) -> Applied {
        let key = event.order_key();
        if self.live_ids.contains(event.id()) || self.timeline.contains(event.id()) {
            warn!(
                conversation_id = %self.conversation_id,
                event_id = %event.id(),
                event_type = event.event_type(),
                "dropping duplicate event"
            );
            counter!("timeline_duplicate_events_total").increment(1);
            return Applied::Duplicate;
        }
        if let Some(last) = self.latest_live_key
            && key < last
        {
            warn!(
                conversation_id = %self.conversation_id,
                event_id = %event.id(),
                event_type = event.event_type(),
                time_us = key.time_us,
                counter = key.counter,
                "rejecting out-of-order event"
            );
            counter!("timeline_out_of_order_events_total").increment(1);
            return Applied::OutOfOrder;
        }
        self.latest_live_key = Some(key);
        let _ = self.live_ids.insert(event.id().to_owned());
        self.dispatch(event)
    }

    #[allow(clippy::match_same_arms)]
    fn dispatch(&mut self, event: ConversationEvent) -> Applied {
        use ConversationEvent as E;
        match event {
            // -- Messaging --
            E::UserMessage { .. } | E::SystemMessage { .. } => self.record(event),

            E::AssistantMessage { .. } => {
                // A complete message supersedes any provisional streamed text.
                self.text_buffers.clear();
                if self.pending_tools.is_empty() && !self.pending.any_pending() {
                    self.agent_phase = AgentPhase::Idle;
                }
                self.record(event)
            }

            E::TextStart {
                ref meta,
                ref text_id,
            } => {
                if self.text_buffers.contains_key(text_id) {
                    warn!(
                        conversation_id = %self.conversation_id,
                        text_id = %text_id,
                        "text block reopened while streaming; replacing buffer"
                    );
                }
                let _ = self.text_buffers.insert(
                    text_id.clone(),
                    TextBuffer {
                        text_id: text_id.clone(),
                        content: String::new(),
                        opened_at: meta.order_key(),
                    },
                );
                Applied::Transient
            }

            E::TextDelta {
                ref text_id,
                ref delta,
                ..
            } => {
                if let Some(buffer) = self.text_buffers.get_mut(text_id) {
                    buffer.content.push_str(delta);
                    Applied::Buffered
                } else {
                    self.orphan(event, "textId")
                }
            }

            E::TextEnd { ref text_id, .. } => {
                if self.text_buffers.remove(text_id).is_none() {
                    return self.orphan(event, "textId");
                }
                self.record(event)
            }

            E::Thought { .. } => {
                self.thought_buffer.clear();
                self.is_thinking_streaming = false;
                self.agent_phase = AgentPhase::Thinking;
                self.record(event)
            }

            E::ThoughtDelta { delta, .. } => {
                self.thought_buffer.push_str(&delta);
                self.is_thinking_streaming = true;
                self.agent_phase = AgentPhase::Thinking;
                Applied::Buffered
            }

            // -- Tooling --
            E::Act {
                ref meta,
                ref tool_call_id,
                ref tool_name,
                ref arguments,
            } => {
                let running = arguments.is_some();
                if self.tool_calls.contains_key(tool_call_id) {
                    warn!(
                        conversation_id = %self.conversation_id,
                        tool_call_id = %tool_call_id,
                        "tool call restarted with an id already tracked; replacing"
                    );
                    self.pending_tools.retain(|t| t.tool_call_id != *tool_call_id);
                }
                let _ = self.tool_calls.insert(
                    tool_call_id.clone(),
                    ActiveToolCall {
                        tool_call_id: tool_call_id.clone(),
                        tool_name: tool_name.clone(),
                        status: if running {
                            ToolCallStatus::Running
                        } else {
                            ToolCallStatus::Preparing
                        },
                        started_at_us: meta.event_time_us,
                        ended_at_us: None,
                        duration_us: None,
                        partial_arguments: String::new(),
                        arguments: arguments.clone(),
                        last_update: None,
                        output: None,
                        error: None,
                    },
                );
                self.pending_tools.push(PendingTool {
                    tool_call_id: tool_call_id.clone(),
                    tool_name: tool_name.clone(),
                });
                self.agent_phase = if running {
                    AgentPhase::Acting
                } else {
                    AgentPhase::Preparing
                };
                self.record(event)
            }

            E::ActDelta {
                ref tool_call_id,
                ref arguments_delta,
                ..
            } => {
                if let Some(call) = self.tool_calls.get_mut(tool_call_id) {
                    call.partial_arguments.push_str(arguments_delta);
                    Applied::Buffered
                } else {
                    self.orphan(event, "toolCallId")
                }
            }

            E::ToolUpdate {
                ref tool_call_id,
                ref update,
                ..
            } => {
                let Some(call) = self.tool_calls.get_mut(tool_call_id) else {
                    return self.orphan(event, "toolCallId");
                };
                if call.status == ToolCallStatus::Preparing {
                    call.status = ToolCallStatus::Running;
                }
                call.last_update = Some(update.clone());
                self.agent_phase = AgentPhase::Acting;
                self.record(event)
            }

            E::Observe {
                ref meta,
                ref tool_call_id,
                success,
                ref output,
                ref error,
            } => {
                let Some(call) = self.tool_calls.get_mut(tool_call_id) else {
                    return self.orphan(event, "toolCallId");
                };
                call.status = if success {
                    ToolCallStatus::Success
                } else {
                    ToolCallStatus::Failed
                };
                call.output = output.clone();
                call.error = error.clone();
                call.ended_at_us = Some(meta.event_time_us);
                call.duration_us = Some((meta.event_time_us - call.started_at_us).max(0));
                // Pop by identity — completions may arrive reordered.
                self.pending_tools.retain(|t| t.tool_call_id != *tool_call_id);
                self.agent_phase = AgentPhase::Observing;
                self.record(event)
            }

            E::SandboxCreated { ref sandbox_id, .. } => {
                self.set_sandbox(sandbox_id, SandboxPhase::Created, None);
                self.record(event)
            }
            E::SandboxReady { ref sandbox_id, .. } => {
                self.set_sandbox(sandbox_id, SandboxPhase::Ready, None);
                self.record(event)
            }
            E::SandboxError {
                ref sandbox_id,
                ref message,
                ..
            } => {
                let message = Some(message.clone());
                self.set_sandbox(sandbox_id, SandboxPhase::Error, message);
                self.record(event)
            }
            E::SandboxTerminated { ref sandbox_id, .. } => {
                self.set_sandbox(sandbox_id, SandboxPhase::Terminated, None);
                self.record(event)
            }

            E::FileChanged { .. } | E::ArtifactCreated { .. } => self.record(event),

            // -- Human in the loop --
            E::ClarificationAsked {
                ref meta,
                ref request_id,
                ref question,
                ref context,
            } => {
                if let Some(pending) = &self.pending.clarification {
                    self.warn_duplicate_ask("clarification", request_id, &pending.request_id);
                } else {
                    self.pending.clarification = Some(PendingClarification {
                        request_id: request_id.clone(),
                        question: question.clone(),
                        context: context.clone(),
                        asked_at: meta.order_key(),
                    });
                    self.enter_awaiting_input();
                }
                self.record(event)
            }

            E::DecisionAsked {
                ref meta,
                ref request_id,
                ref prompt,
                ref options,
            } => {
                if let Some(pending) = &self.pending.decision {
                    self.warn_duplicate_ask("decision", request_id, &pending.request_id);
                } else {
                    self.pending.decision = Some(PendingDecision {
                        request_id: request_id.clone(),
                        prompt: prompt.clone(),
                        options: options.clone(),
                        asked_at: meta.order_key(),
                    });
                    self.enter_awaiting_input();
                }
                self.record(event)
            }

            E::EnvVarRequested {
                ref meta,
                ref request_id,
                ref names,
                ref reason,
            } => {
                if let Some(pending) = &self.pending.env_var {
                    self.warn_duplicate_ask("env_var", request_id, &pending.request_id);
                } else {
                    self.pending.env_var = Some(PendingEnvVar {
                        request_id: request_id.clone(),
                        names: names.clone(),
                        reason: reason.clone(),
                        asked_at: meta.order_key(),
                    });
                    self.enter_awaiting_input();
                }
                self.record(event)
            }

            E::PermissionAsked {
                ref meta,
                ref request_id,
                ref tool_name,
                ref description,
            } => {
                if let Some(pending) = &self.pending.permission {
                    self.warn_duplicate_ask("permission", request_id, &pending.request_id);
                } else {
                    self.pending.permission = Some(PendingPermission {
                        request_id: request_id.clone(),
                        tool_name: tool_name.clone(),
                        description: description.clone(),
                        asked_at: meta.order_key(),
                    });
                    self.enter_awaiting_input();
                }
                self.record(event)
            }

            E::ClarificationAnswered { ref request_id, .. } => {
                if self
                    .pending
                    .clarification
                    .as_ref()
                    .is_some_and(|p| p.request_id == *request_id)
                {
                    self.pending.clarification = None;
                    self.leave_awaiting_input();
                    self.record(event)
                } else {
                    self.orphan(event, "requestId")
                }
            }

            E::DecisionMade { ref request_id, .. } => {
                if self
                    .pending
                    .decision
                    .as_ref()
                    .is_some_and(|p| p.request_id == *request_id)
                {
                    self.pending.decision = None;
                    self.leave_awaiting_input();
                    self.record(event)
                } else {
                    self.orphan(event, "requestId")
                }
            }

            E::EnvVarProvided { ref request_id, .. } => {
                if self
                    .pending
                    .env_var
                    .as_ref()
                    .is_some_and(|p| p.request_id == *request_id)
                {
                    self.pending.env_var = None;
                    self.leave_awaiting_input();
                    self.record(event)
                } else {
                    self.orphan(event, "requestId")
                }
            }

            E::PermissionReplied { ref request_id, .. } => {
                if self
                    .pending
                    .permission
                    .as_ref()
                    .is_some_and(|p| p.request_id == *request_id)
                {
                    self.pending.permission = None;
                    self.leave_awaiting_input();
                    self.record(event)
                } else {
                    self.orphan(event, "requestId")
                }
            }

            E::DoomLoopDetected {
                ref meta,
                ref request_id,
                ref pattern,
                repetitions,
            } => {
                // A newer detection is updated analysis of the same stall.
                self.doom_loop = Some(DoomLoopAlert {
                    request_id: request_id.clone(),
                    pattern: pattern.clone(),
                    repetitions,
                    detected_at: meta.order_key(),
                });
                self.record(event)
            }

            E::DoomLoopIntervened { ref request_id, .. } => {
                if self
                    .doom_loop
                    .as_ref()
                    .is_some_and(|alert| alert.request_id == *request_id)
                {
                    self.doom_loop = None;
                    self.record(event)
                } else {
                    self.orphan(event, "requestId")
                }
            }

            // -- Agent lifecycle --
            E::AgentStarted { .. } => self.record(event),

            E::TurnStarted { turn, .. } => {
                self.turn = turn;
                self.record(event)
            }

            E::AgentReady { .. } => {
                self.agent_phase = AgentPhase::Idle;
                self.record(event)
            }

            E::TurnCompleted {
                turn,
                ref usage,
                cost_usd,
                ..
            } => {
                self.turn = turn;
                if let Some(usage) = usage {
                    self.cost.usage = usage.clone();
                }
                if let Some(cost_usd) = cost_usd {
                    self.cost.total_usd = cost_usd;
                }
                self.record(event)
            }

            E::Retry { .. } => {
                self.agent_phase = AgentPhase::Retrying;
                self.record(event)
            }

            E::Completed { ref meta, .. } | E::Cancelled { ref meta, .. } => {
                let (id, key) = (meta.id.clone(), meta.order_key());
                self.close_stream(&id, key, StreamStatus::Idle);
                self.record(event)
            }

            E::Error { ref meta, .. } => {
                let (id, key) = (meta.id.clone(), meta.order_key());
                self.close_stream(&id, key, StreamStatus::Error);
                self.record(event)
            }

            // -- System --
            E::Connected { .. } => {
                self.stream_status = StreamStatus::Streaming;
                self.record(event)
            }

            E::Heartbeat { .. } => Applied::Transient,

            E::CostUpdated { total_usd, .. } => {
                self.cost.total_usd = total_usd;
                self.record(event)
            }

            E::UsageUpdated { ref usage, .. } => {
                self.cost.usage = usage.clone();
                self.record(event)
            }

            E::SuggestionsUpdated { ref suggestions, .. } => {
                self.suggestions = suggestions.clone();
                self.record(event)
            }

            E::TasksUpdated { ref tasks, .. } => {
                self.tasks = tasks.clone();
                self.record(event)
            }

            E::TaskStatusChanged {
                ref task_id,
                status,
                ..
            } => {
                let Some(task) = self.tasks.iter_mut().find(|t| t.id == *task_id) else {
                    return self.orphan(event, "taskId");
                };
                task.status = status;
                self.record(event)
            }

            E::ContextInjected {
                ref source,
                ref content,
                ..
            } => {
                self.app_context = Some(crate::state::InjectedContext {
                    source: source.clone(),
                    content: content.clone(),
                });
                self.record(event)
            }

            E::SnapshotSaved { .. } => self.record(event),

            E::ConversationUpdated {
                ref title,
                ref model,
                ..
            } => {
                if title.is_some() {
                    self.metadata.title = title.clone();
                }
                if model.is_some() {
                    self.metadata.model = model.clone();
                }
                self.record(event)
            }
        }
    }

    /// Locally abort the stream (user stop, navigation away).
    ///
    /// Behaves like a `cancelled` terminal: open buffers flush into
    /// incomplete timeline entries (timestamped from the latest seen ordering
    /// key — the reducer never reads the clock), running tool calls are
    /// interrupted, and the status settles to `idle`.
    pub fn abort_stream(&mut self, reason: &str) {
        debug!(
            conversation_id = %self.conversation_id,
            reason,
            "aborting stream locally"
        );
        let key = self.latest_live_key.unwrap_or(OrderKey::new(0, 0));
        self.close_stream("local_abort", key, StreamStatus::Idle);
    }

    fn record(&mut self, event: ConversationEvent) -> Applied {
        let _ = self.timeline.append(event);
        Applied::Appended
    }

    fn orphan(&mut self, event: ConversationEvent, id_space: &str) -> Applied {
        warn!(
            conversation_id = %self.conversation_id,
            event_id = %event.id(),
            event_type = event.event_type(),
            id_space,
            "correlation miss; degrading to timeline-only record"
        );
        counter!("timeline_orphan_events_total").increment(1);
        let _ = self.timeline.append(event);
        Applied::OrphanAppended
    }

    fn warn_duplicate_ask(&self, kind: &str, request_id: &str, pending_request_id: &str) {
        warn!(
            conversation_id = %self.conversation_id,
            kind,
            request_id,
            pending_request_id,
            "duplicate request while one is pending; keeping the first"
        );
        counter!("timeline_duplicate_hitl_asks_total").increment(1);
    }

    fn enter_awaiting_input(&mut self) {
        if self.agent_phase != AgentPhase::AwaitingInput {
            self.phase_before_input = Some(self.agent_phase);
            self.agent_phase = AgentPhase::AwaitingInput;
        }
    }

    fn leave_awaiting_input(&mut self) {
        if !self.pending.any_pending() {
            self.agent_phase = self.phase_before_input.take().unwrap_or(AgentPhase::Idle);
        }
    }

    fn set_sandbox(&mut self, sandbox_id: &str, phase: SandboxPhase, message: Option<String>) {
        self.sandbox = Some(SandboxState {
            sandbox_id: sandbox_id.to_owned(),
            phase,
            message,
        });
    }

    /// Close every open streaming construct: flush text/thought buffers into
    /// incomplete entries keyed off `parent_id`, interrupt in-flight tool
    /// calls, and settle phase and stream status.
    fn close_stream(&mut self, parent_id: &str, key: OrderKey, status: StreamStatus) {
        let mut buffers: Vec<TextBuffer> = self.text_buffers.drain().map(|(_, b)| b).collect();
        buffers.sort_by_key(|b| b.opened_at);
        for buffer in buffers {
            let _ = self.timeline.append(ConversationEvent::TextEnd {
                meta: EventMeta {
                    id: format!("{parent_id}/flush/{}", buffer.text_id),
                    conversation_id: self.conversation_id.clone(),
                    event_time_us: key.time_us,
                    event_counter: key.counter,
                },
                text_id: buffer.text_id,
                content: buffer.content,
                incomplete: Some(true),
            });
        }

        if !self.thought_buffer.is_empty() {
            let content = std::mem::take(&mut self.thought_buffer);
            let _ = self.timeline.append(ConversationEvent::Thought {
                meta: EventMeta {
                    id: format!("{parent_id}/flush/thought"),
                    conversation_id: self.conversation_id.clone(),
                    event_time_us: key.time_us,
                    event_counter: key.counter,
                },
                content,
                incomplete: Some(true),
            });
        }
        self.is_thinking_streaming = false;

        for call in self.tool_calls.values_mut() {
            if matches!(call.status, ToolCallStatus::Preparing | ToolCallStatus::Running) {
                call.status = ToolCallStatus::Failed;
                call.error = Some("interrupted before completion".into());
                call.ended_at_us = Some(key.time_us);
                call.duration_us = Some((key.time_us - call.started_at_us).max(0));
            }
        }
        self.pending_tools.clear();

        self.phase_before_input = None;
        self.agent_phase = AgentPhase::Idle;
        self.stream_status = status;
    }
}
