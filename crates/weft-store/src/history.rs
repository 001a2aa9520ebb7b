//! The async collaborator seam for paginated history fetches.
//!
//! The engine consumes pages; the REST client produces them. The only await
//! points in the engine live here — the merge itself is synchronous and the
//! pending slot/buffer state is never touched by a fetch.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;
use weft_events::OrderKey;
use weft_timeline::{HistoryPage, MergeOutcome};

use crate::error::{HistoryError, StoreError};
use crate::store::ConversationStore;

/// A request for events strictly older than `before`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRequest {
    /// Conversation to page through.
    pub conversation_id: String,
    /// Exclusive upper bound on the returned events' ordering keys.
    pub before: OrderKey,
    /// Maximum events to return.
    pub limit: usize,
}

/// The paginated-history collaborator (a REST client, in production).
#[async_trait]
pub trait HistoryClient: Send + Sync {
    /// Fetch one page of events strictly older than `request.before`.
    async fn fetch_earlier(&self, request: HistoryRequest) -> Result<HistoryPage, HistoryError>;
}

impl ConversationStore {
    /// Fetch and merge one page of older history for a conversation.
    ///
    /// Builds the request from the state's cursors, awaits the collaborator,
    /// and merges the page. Safe to call while the conversation streams —
    /// pages are range-disjoint from live events by construction.
    pub async fn backfill_earlier(
        &mut self,
        conversation_id: &str,
        client: &dyn HistoryClient,
        limit: usize,
    ) -> Result<MergeOutcome, StoreError> {
        let before = self
            .state(conversation_id)
            .ok_or_else(|| StoreError::UnknownConversation {
                conversation_id: conversation_id.to_owned(),
            })?
            .backfill_cursor();

        let request = HistoryRequest {
            conversation_id: conversation_id.to_owned(),
            before,
            limit,
        };
        let page = client.fetch_earlier(request).await?;

        let state = self.entry_state_mut(conversation_id)?;
        let outcome = state.merge_earlier(page);
        debug!(
            conversation_id,
            inserted = outcome.inserted,
            duplicates = outcome.duplicates,
            rejected = outcome.rejected,
            "merged history page"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use weft_events::{ConversationEvent, EventMeta};

    const CONV: &str = "conv_1";

    fn message(id: &str, time_us: i64, counter: i64) -> ConversationEvent {
        ConversationEvent::UserMessage {
            meta: EventMeta {
                id: id.into(),
                conversation_id: CONV.into(),
                event_time_us: time_us,
                event_counter: counter,
            },
            content: format!("content of {id}"),
            image_count: None,
        }
    }

    /// Serves queued pages and records the requests it saw.
    struct StubHistoryClient {
        pages: Mutex<VecDeque<Result<HistoryPage, HistoryError>>>,
        requests: Mutex<Vec<HistoryRequest>>,
    }

    impl StubHistoryClient {
        fn with_pages(pages: Vec<Result<HistoryPage, HistoryError>>) -> Self {
            Self {
                pages: Mutex::new(pages.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn requests(&self) -> Vec<HistoryRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl HistoryClient for StubHistoryClient {
        async fn fetch_earlier(
            &self,
            request: HistoryRequest,
        ) -> Result<HistoryPage, HistoryError> {
            self.requests.lock().unwrap().push(request);
            self.pages
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(HistoryError::Transport("no more pages queued".into())))
        }
    }

    #[tokio::test]
    async fn backfill_pages_walk_backwards_through_history() {
        let mut store = ConversationStore::new();
        let _ = store.open(CONV);
        let _ = store.route(message("live_1", 10_000, 1)).unwrap();

        let client = StubHistoryClient::with_pages(vec![
            Ok(HistoryPage {
                events: vec![message("old_3", 300, 1), message("old_4", 400, 1)],
                has_more: true,
                earliest_time_us: 300,
                earliest_counter: 1,
            }),
            Ok(HistoryPage {
                events: vec![message("old_1", 100, 1), message("old_2", 200, 1)],
                has_more: false,
                earliest_time_us: 100,
                earliest_counter: 1,
            }),
        ]);

        let first = store.backfill_earlier(CONV, &client, 2).await.unwrap();
        assert_eq!(first.inserted, 2);
        assert!(store.state(CONV).unwrap().has_earlier());

        let second = store.backfill_earlier(CONV, &client, 2).await.unwrap();
        assert_eq!(second.inserted, 2);
        assert!(!store.state(CONV).unwrap().has_earlier());

        let ids: Vec<&str> = store
            .state(CONV)
            .unwrap()
            .timeline()
            .events()
            .iter()
            .map(ConversationEvent::id)
            .collect();
        assert_eq!(ids, ["old_1", "old_2", "old_3", "old_4", "live_1"]);

        // First request starts from the live window; the second resumes from
        // the first page's cursor.
        let requests = client.requests();
        assert_eq!(requests[0].before, OrderKey::new(10_000, 1));
        assert_eq!(requests[1].before, OrderKey::new(300, 1));
        assert_eq!(requests[0].limit, 2);
    }

    #[tokio::test]
    async fn backfill_failure_propagates_and_leaves_state_alone() {
        let mut store = ConversationStore::new();
        let _ = store.open(CONV);
        let _ = store.route(message("live_1", 10_000, 1)).unwrap();

        let client = StubHistoryClient::with_pages(vec![Err(HistoryError::Transport(
            "connection reset".into(),
        ))]);
        let err = store.backfill_earlier(CONV, &client, 50).await.unwrap_err();
        assert_matches!(err, StoreError::History(HistoryError::Transport(_)));
        assert_eq!(store.state(CONV).unwrap().timeline().len(), 1);
        assert!(!store.state(CONV).unwrap().has_earlier());
    }

    #[tokio::test]
    async fn backfill_unknown_conversation_never_fetches() {
        let mut store = ConversationStore::new();
        let client = StubHistoryClient::with_pages(vec![]);
        let err = store
            .backfill_earlier("conv_ghost", &client, 10)
            .await
            .unwrap_err();
        assert_matches!(err, StoreError::UnknownConversation { .. });
        assert!(client.requests().is_empty());
    }

    #[tokio::test]
    async fn empty_timeline_requests_from_the_end() {
        let mut store = ConversationStore::new();
        let _ = store.open(CONV);
        let client = StubHistoryClient::with_pages(vec![Ok(HistoryPage {
            events: vec![message("old_1", 100, 1)],
            has_more: false,
            earliest_time_us: 100,
            earliest_counter: 1,
        })]);
        let outcome = store.backfill_earlier(CONV, &client, 10).await.unwrap();
        assert_eq!(outcome.inserted, 1);
        assert_eq!(client.requests()[0].before, OrderKey::MAX);
    }

    #[test]
    fn history_request_wire_shape() {
        let request = HistoryRequest {
            conversation_id: CONV.into(),
            before: OrderKey::new(1_000, 7),
            limit: 50,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["conversationId"], CONV);
        assert_eq!(json["before"]["timeUs"], 1_000);
        assert_eq!(json["before"]["counter"], 7);
        assert_eq!(json["limit"], 50);
    }
}
