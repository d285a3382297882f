//! Feed update watching
//!
//! Thin glue between the fan-out dispatcher and the feed screens: a
//! create or update event on the posts collection means the feed may be
//! stale, so the registered callback is invoked and the caller re-runs
//! its fetch cycle.

use std::sync::Arc;

use pulse_realtime::{ChangeEvent, FanoutDispatcher, RealtimeError, Subscription, WatchKey};

use crate::models::FeedType;

pub struct FeedWatcher {
    dispatcher: Arc<FanoutDispatcher>,
    posts_collection: String,
}

impl FeedWatcher {
    pub fn new(dispatcher: Arc<FanoutDispatcher>, posts_collection: impl Into<String>) -> Self {
        Self {
            dispatcher,
            posts_collection: posts_collection.into(),
        }
    }

    /// Invoke `on_change` whenever a post is created or updated.
    /// Dropping the returned subscription stops the watch.
    pub async fn watch<F>(
        &self,
        feed_type: FeedType,
        on_change: F,
    ) -> Result<Subscription, RealtimeError>
    where
        F: Fn(FeedType) + Send + Sync + 'static,
    {
        let key = WatchKey::collection(&self.posts_collection);
        self.dispatcher
            .subscribe(
                key,
                Arc::new(move |event: &ChangeEvent| {
                    if event.is_create() || event.is_update() {
                        on_change(feed_type);
                    }
                }),
            )
            .await
    }
}
