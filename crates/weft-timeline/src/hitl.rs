//! Human-in-the-loop pending slots and the derived summary projection.
//!
//! Each of the four request kinds owns one slot. A slot is filled by its
//! "asked" event only when empty (first-pending-wins — overwriting could
//! orphan a prompt the user is already answering) and cleared only by a
//! reply carrying the same `requestId`. The UI-facing summary is a pure
//! projection over the slots, recomputed on every read, never stored — so
//! it cannot drift from the raw slot state.

use serde::Serialize;
use weft_events::{DecisionOption, OrderKey};

/// The four request kinds, in summary precedence order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HitlKind {
    /// Free-form clarifying question.
    Clarification,
    /// Choice between offered options.
    Decision,
    /// Environment-variable values needed.
    EnvVar,
    /// Permission for a tool action.
    Permission,
}

/// A pending clarification request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingClarification {
    /// Correlation id echoed by the answer.
    pub request_id: String,
    /// The question to surface.
    pub question: String,
    /// Optional supporting context.
    pub context: Option<String>,
    /// Ordering key of the asking event.
    pub asked_at: OrderKey,
}

/// A pending decision request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingDecision {
    /// Correlation id echoed by the choice.
    pub request_id: String,
    /// The prompt to surface.
    pub prompt: String,
    /// Offered options.
    pub options: Vec<DecisionOption>,
    /// Ordering key of the asking event.
    pub asked_at: OrderKey,
}

/// A pending environment-variable request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingEnvVar {
    /// Correlation id echoed when values are provided.
    pub request_id: String,
    /// Variable names needed.
    pub names: Vec<String>,
    /// Why they are needed.
    pub reason: Option<String>,
    /// Ordering key of the asking event.
    pub asked_at: OrderKey,
}

/// A pending permission request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingPermission {
    /// Correlation id echoed by the reply.
    pub request_id: String,
    /// Tool awaiting permission.
    pub tool_name: String,
    /// What the tool wants to do.
    pub description: String,
    /// Ordering key of the asking event.
    pub asked_at: OrderKey,
}

/// The four independent pending slots.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingRequests {
    /// Pending clarification, if any.
    pub clarification: Option<PendingClarification>,
    /// Pending decision, if any.
    pub decision: Option<PendingDecision>,
    /// Pending env-var request, if any.
    pub env_var: Option<PendingEnvVar>,
    /// Pending permission, if any.
    pub permission: Option<PendingPermission>,
}

impl PendingRequests {
    /// Whether any slot is occupied.
    #[must_use]
    pub fn any_pending(&self) -> bool {
        self.clarification.is_some()
            || self.decision.is_some()
            || self.env_var.is_some()
            || self.permission.is_some()
    }

    /// The single UI-facing summary: the highest-precedence occupied slot
    /// (clarification > decision > env-var > permission), or `None`.
    #[must_use]
    pub fn summary(&self) -> Option<HitlSummary> {
        if let Some(p) = &self.clarification {
            return Some(HitlSummary {
                kind: HitlKind::Clarification,
                request_id: p.request_id.clone(),
                prompt: p.question.clone(),
            });
        }
        if let Some(p) = &self.decision {
            return Some(HitlSummary {
                kind: HitlKind::Decision,
                request_id: p.request_id.clone(),
                prompt: p.prompt.clone(),
            });
        }
        if let Some(p) = &self.env_var {
            return Some(HitlSummary {
                kind: HitlKind::EnvVar,
                request_id: p.request_id.clone(),
                prompt: format!("Provide values for {}", p.names.join(", ")),
            });
        }
        if let Some(p) = &self.permission {
            return Some(HitlSummary {
                kind: HitlKind::Permission,
                request_id: p.request_id.clone(),
                prompt: format!("Allow {}? {}", p.tool_name, p.description),
            });
        }
        None
    }
}

/// What the user is being asked right now.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HitlSummary {
    /// Which kind of request is surfaced.
    pub kind: HitlKind,
    /// Correlation id to answer with.
    pub request_id: String,
    /// Display prompt.
    pub prompt: String,
}

/// An unaddressed doom-loop detection.
///
/// At most one at a time; a newer detection replaces an unaddressed one,
/// since it is updated analysis of the same stall. Does not block input —
/// surfaced alongside, not through, the HITL summary.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DoomLoopAlert {
    /// Correlation id cleared by the intervention.
    pub request_id: String,
    /// Description of the repeating pattern.
    pub pattern: String,
    /// How many repetitions were observed.
    pub repetitions: u32,
    /// Ordering key of the detection event.
    pub detected_at: OrderKey,
}
