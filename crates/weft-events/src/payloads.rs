//! Shared payload structs referenced by multiple event kinds.

use serde::{Deserialize, Serialize};

/// Token totals as reported by the backend.
///
/// The backend is the single source of truth for these — consumers replace,
/// never accumulate.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageTotals {
    /// Input tokens consumed.
    pub input_tokens: u64,
    /// Output tokens generated.
    pub output_tokens: u64,
    /// Tokens read from prompt cache.
    #[serde(default)]
    pub cache_read_tokens: u64,
    /// Tokens written to prompt cache.
    #[serde(default)]
    pub cache_creation_tokens: u64,
}

/// One selectable option in a `decision_asked` prompt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionOption {
    /// Stable option id echoed back in `decision_made`.
    pub id: String,
    /// Display label.
    pub label: String,
    /// Optional longer description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Status of one checklist entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Not started.
    Pending,
    /// Currently being worked.
    InProgress,
    /// Finished.
    Completed,
    /// Abandoned.
    Skipped,
}

/// One entry in the agent's task checklist.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskItem {
    /// Stable task id.
    pub id: String,
    /// Short task title.
    pub title: String,
    /// Current status.
    pub status: TaskStatus,
}

/// Kind of change reported by a `file_changed` event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileChange {
    /// File was created.
    Created,
    /// File contents were modified.
    Modified,
    /// File was deleted.
    Deleted,
}
