//! Typed errors for store and history operations.

use thiserror::Error;

/// Failure of a history-page fetch. The REST client is a collaborator;
/// these wrap whatever it reports into the two shapes the engine can act on.
#[derive(Clone, Debug, Error)]
pub enum HistoryError {
    /// The fetch itself failed (network, timeout, server error).
    #[error("history fetch failed: {0}")]
    Transport(String),
    /// The response arrived but did not match the page shape.
    #[error("history response malformed: {0}")]
    Decode(String),
}

/// Failure of a store operation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The conversation was never opened (events never auto-create state).
    #[error("conversation {conversation_id} is not open")]
    UnknownConversation {
        /// The id that failed to resolve.
        conversation_id: String,
    },
    /// The streaming cap is saturated; the caller owns retry/queue policy.
    #[error("streaming limit reached ({capacity} conversations)")]
    StreamLimitReached {
        /// The configured cap.
        capacity: usize,
    },
    /// A backfill fetch failed.
    #[error(transparent)]
    History(#[from] HistoryError),
}

impl StoreError {
    /// Short classification string for logging/metrics.
    #[must_use]
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::UnknownConversation { .. } => "unknown_conversation",
            Self::StreamLimitReached { .. } => "stream_limit_reached",
            Self::History(HistoryError::Transport(_)) => "history_transport",
            Self::History(HistoryError::Decode(_)) => "history_decode",
        }
    }

    /// Whether retrying the same call later can succeed without any other
    /// store interaction.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::StreamLimitReached { .. } | Self::History(HistoryError::Transport(_))
        )
    }
}
