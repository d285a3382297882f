//! Pagination cursor manager
//!
//! Wraps one feed session's paging state: accumulated items, current
//! cursor, the has-more flag, and a single-flight guard so a fast
//! double-tap on "load more" cannot issue two overlapping requests for
//! the same next page.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::Result;
use crate::models::{FeedRequest, FeedType, Post};
use crate::services::feed::FeedService;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// A page was fetched; carries the number of newly appended items.
    Loaded(usize),
    /// Skipped: a load was already in flight, or the feed is exhausted.
    Skipped,
}

#[derive(Default)]
struct SessionState {
    items: Vec<Post>,
    seen_ids: HashSet<String>,
    cursor: Option<String>,
    has_more: bool,
}

pub struct FeedSession {
    feed: Arc<FeedService>,
    feed_type: FeedType,
    page_size: usize,
    viewer_id: Option<String>,
    followed_ids: Option<Vec<String>>,
    state: Mutex<SessionState>,
    in_flight: AtomicBool,
}

/// Releases the single-flight guard on every exit path.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl FeedSession {
    pub fn new(feed: Arc<FeedService>, feed_type: FeedType, page_size: usize) -> Self {
        Self {
            feed,
            feed_type,
            page_size,
            viewer_id: None,
            followed_ids: None,
            state: Mutex::new(SessionState {
                has_more: true,
                ..SessionState::default()
            }),
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn with_viewer(mut self, viewer_id: impl Into<String>) -> Self {
        self.viewer_id = Some(viewer_id.into());
        self
    }

    pub fn with_followed_ids(mut self, followed_ids: Vec<String>) -> Self {
        self.followed_ids = Some(followed_ids);
        self
    }

    /// Clear cursor and results; used on feed-type switch or
    /// pull-to-refresh.
    pub fn reset(&self) {
        let mut state = self.lock_state();
        state.items.clear();
        state.seen_ids.clear();
        state.cursor = None;
        state.has_more = true;
    }

    /// Fetch and append the next page.
    ///
    /// No-op while a load is in flight or once the feed is exhausted. On
    /// failure the session state is untouched and the error surfaces to
    /// the caller — the fallback chain lives one layer below, in
    /// [`FeedService::fetch_feed`].
    ///
    /// Ids already delivered in this session are dropped on append.
    /// Scored feeds re-rank each fetch window, so a candidate from an
    /// earlier page can resurface after the cursor; it must not be shown
    /// twice.
    pub async fn load_next(&self) -> Result<LoadOutcome> {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            return Ok(LoadOutcome::Skipped);
        }
        let _guard = InFlightGuard(&self.in_flight);

        let (cursor, has_more) = {
            let state = self.lock_state();
            (state.cursor.clone(), state.has_more)
        };
        if !has_more {
            return Ok(LoadOutcome::Skipped);
        }

        let request = FeedRequest {
            limit: self.page_size,
            cursor,
            viewer_id: self.viewer_id.clone(),
            followed_ids: self.followed_ids.clone(),
        };
        let page = self.feed.fetch_feed(self.feed_type, &request).await?;

        let mut state = self.lock_state();
        state.has_more = page.has_more;
        if let Some(cursor) = page.next_cursor {
            state.cursor = Some(cursor);
        }
        let mut appended = 0;
        for post in page.items {
            if state.seen_ids.insert(post.id.clone()) {
                state.items.push(post);
                appended += 1;
            }
        }
        Ok(LoadOutcome::Loaded(appended))
    }

    pub fn items(&self) -> Vec<Post> {
        self.lock_state().items.clone()
    }

    pub fn has_more(&self) -> bool {
        self.lock_state().has_more
    }

    pub fn cursor(&self) -> Option<String> {
        self.lock_state().cursor.clone()
    }

    // never held across an await point
    fn lock_state(&self) -> std::sync::MutexGuard<'_, SessionState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
