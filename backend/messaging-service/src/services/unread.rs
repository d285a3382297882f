//! Unread aggregation
//!
//! Computes the chat and notification badge counts for a user. Both
//! numbers are display values capped at 99, and both fail open to zero:
//! a broken lookup must never block badge rendering.
//!
//! The chat count scans the most recent messages of every thread the
//! user belongs to, so it costs one query per thread. A message that has
//! fallen out of the scan window is never counted, even if unread; a
//! per-(user, thread) last-read pointer would replace this scan with an
//! O(1) check per thread.

use std::sync::Arc;

use tracing::warn;

use pulse_docstore::{DocumentStore, Filter, Query, StoreError};

use crate::config::CollectionsConfig;
use crate::metrics;
use crate::models::{Badges, ChatThread, Message};

/// Messages inspected per thread, newest first.
pub const MESSAGE_SCAN_WINDOW: u32 = 30;

/// Display cap for both badge values.
pub const BADGE_CAP: u32 = 99;

const NOTIFICATION_FETCH_LIMIT: u32 = 50;

pub struct UnreadAggregator {
    store: Arc<dyn DocumentStore>,
    threads_collection: String,
    messages_collection: String,
    notifications_collection: String,
}

impl UnreadAggregator {
    pub fn new(store: Arc<dyn DocumentStore>, collections: &CollectionsConfig) -> Self {
        Self {
            store,
            threads_collection: collections.threads.clone(),
            messages_collection: collections.messages.clone(),
            notifications_collection: collections.notifications.clone(),
        }
    }

    /// Badge counts for `user_id`. Never fails: a metric whose lookups
    /// error comes back as 0.
    pub async fn badges(&self, user_id: &str) -> Badges {
        let chats = match self.unread_thread_count(user_id).await {
            Ok(count) => count,
            Err(err) => {
                warn!(user_id, error = %err, "chat unread aggregation failed, reporting 0");
                metrics::AGGREGATION_FAILURES
                    .with_label_values(&["chats"])
                    .inc();
                0
            }
        };
        let notifications = match self.notification_count(user_id).await {
            Ok(count) => count,
            Err(err) => {
                warn!(user_id, error = %err, "notification aggregation failed, reporting 0");
                metrics::AGGREGATION_FAILURES
                    .with_label_values(&["notifications"])
                    .inc();
                0
            }
        };
        Badges {
            chats,
            notifications,
        }
    }

    /// Number of member threads holding at least one unread message
    /// within the scan window, capped at [`BADGE_CAP`].
    async fn unread_thread_count(&self, user_id: &str) -> Result<u32, StoreError> {
        let query = Query::new().filter(Filter::contains("member_ids", user_id));
        let threads = self.store.list(&self.threads_collection, query).await?;

        let mut unread = 0u32;
        for doc in &threads.documents {
            let thread: ChatThread = match doc.decode() {
                Ok(thread) => thread,
                Err(err) => {
                    warn!(id = %doc.id, error = %err, "skipping undecodable thread");
                    continue;
                }
            };
            if !thread.has_member(user_id) {
                continue;
            }
            if self.thread_has_unread(&thread.id, user_id).await? {
                unread += 1;
                if unread >= BADGE_CAP {
                    break;
                }
            }
        }
        Ok(unread.min(BADGE_CAP))
    }

    async fn thread_has_unread(&self, thread_id: &str, user_id: &str) -> Result<bool, StoreError> {
        let query = Query::new()
            .filter(Filter::equal("thread_id", thread_id))
            .order_desc("created_at")
            .limit(MESSAGE_SCAN_WINDOW);
        let page = self.store.list(&self.messages_collection, query).await?;

        for doc in page.documents {
            let message: Message = match doc.decode() {
                Ok(message) => message,
                Err(err) => {
                    warn!(id = %doc.id, error = %err, "skipping undecodable message");
                    continue;
                }
            };
            if message.sender_id != user_id && !message.is_read_by(user_id) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Count of recent notifications, read or not, capped at
    /// [`BADGE_CAP`]. Uses the store-reported total so the badge is
    /// right even though only one page of documents is fetched.
    async fn notification_count(&self, user_id: &str) -> Result<u32, StoreError> {
        let query = Query::new()
            .filter(Filter::equal("recipient_id", user_id))
            .order_desc("created_at")
            .limit(NOTIFICATION_FETCH_LIMIT);
        let page = self
            .store
            .list(&self.notifications_collection, query)
            .await?;
        Ok(page.total.min(BADGE_CAP as u64) as u32)
    }
}
