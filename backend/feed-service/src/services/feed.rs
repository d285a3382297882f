//! Feed fetch orchestration
//!
//! Issues the store queries behind each feed type, runs the ranking
//! engine, and applies the two-tier fallback contract: a failed ranked
//! query degrades to a plain reverse-chronological fetch before any
//! error reaches the handler.

use std::sync::Arc;

use chrono::Utc;
use tracing::warn;

use pulse_docstore::{Document, DocumentStore, Filter, Query};

use crate::config::FeedConfig;
use crate::error::Result;
use crate::metrics;
use crate::models::{FeedPage, FeedRequest, FeedType, Post};
use crate::services::ranking;

pub struct FeedService {
    store: Arc<dyn DocumentStore>,
    posts_collection: String,
    follows_collection: String,
    overfetch_factor: u32,
}

impl FeedService {
    pub fn new(store: Arc<dyn DocumentStore>, config: &FeedConfig) -> Self {
        Self {
            store,
            posts_collection: config.posts_collection.clone(),
            follows_collection: config.follows_collection.clone(),
            overfetch_factor: config.overfetch_factor.max(1),
        }
    }

    /// Fetch one page of `feed_type`.
    ///
    /// The ranked pass and the unranked fallback both run here; an error
    /// escapes only when the fallback fails as well, and the handler then
    /// serves the empty state.
    pub async fn fetch_feed(&self, feed_type: FeedType, request: &FeedRequest) -> Result<FeedPage> {
        if feed_type == FeedType::Following {
            let followed = match &request.followed_ids {
                Some(ids) => ids.clone(),
                None => {
                    let viewer = request
                        .viewer_id
                        .as_deref()
                        .ok_or(crate::error::AppError::AuthRequired)?;
                    self.followed_ids(viewer).await?
                }
            };
            if followed.is_empty() {
                return Ok(FeedPage::empty());
            }
            return self.with_fallback(feed_type, request, Some(followed)).await;
        }

        self.with_fallback(feed_type, request, None).await
    }

    async fn with_fallback(
        &self,
        feed_type: FeedType,
        request: &FeedRequest,
        followed: Option<Vec<String>>,
    ) -> Result<FeedPage> {
        match self.fetch_ranked(feed_type, request, followed.as_deref()).await {
            Ok(page) => Ok(page),
            Err(err) => {
                warn!(
                    feed_type = feed_type.as_str(),
                    error = %err,
                    "ranked feed query failed, serving unranked fallback"
                );
                metrics::FEED_FALLBACKS
                    .with_label_values(&[feed_type.as_str()])
                    .inc();
                self.fetch_unranked(request).await
            }
        }
    }

    /// The ranked pass for one feed type. Fails with `FeedUnavailable`
    /// when the underlying query does; no fallback at this layer.
    pub async fn fetch_ranked(
        &self,
        feed_type: FeedType,
        request: &FeedRequest,
        followed: Option<&[String]>,
    ) -> Result<FeedPage> {
        let limit = request.limit;
        let fetch_limit = if feed_type.is_scored() {
            (limit as u32).saturating_mul(self.overfetch_factor)
        } else {
            limit as u32
        };

        let now = Utc::now();
        let mut query = Query::new().order_desc("created_at").limit(fetch_limit);
        if let Some(cursor) = &request.cursor {
            query = query.cursor_after(cursor.clone());
        }

        query = match feed_type {
            FeedType::Home => {
                let cutoff = now - chrono::Duration::days(ranking::HOME_WINDOW_DAYS);
                query.filter(Filter::greater_or_equal(
                    "created_at",
                    cutoff.to_rfc3339(),
                ))
            }
            FeedType::Reels => query.filter(Filter::equal("kind", "reel")),
            FeedType::News => query.filter(Filter::equal("kind", "news")),
            FeedType::Following => match followed {
                Some(ids) => query.filter(Filter::any_of("author_id", ids.to_vec())),
                None => query,
            },
            // watch eligibility (video reference present) is not
            // expressible in the filter language; enforced by the ranker
            FeedType::Watch | FeedType::Default => query,
        };

        let raw = self.store.list(&self.posts_collection, query).await?;
        let candidates = decode_posts(raw.documents);

        let items = match feed_type {
            FeedType::Home => ranking::rank_home(candidates, now, limit),
            FeedType::Watch => ranking::rank_watch(candidates, limit),
            FeedType::Reels => ranking::rank_reels(candidates, limit),
            FeedType::Following => {
                ranking::rank_following(candidates, followed.unwrap_or(&[]), limit)
            }
            FeedType::News => ranking::rank_news(candidates, limit),
            FeedType::Default => ranking::rank_default(candidates, limit),
        };

        Ok(to_page(items, limit))
    }

    /// Degraded mode: plain reverse-chronological page, no scoring.
    pub async fn fetch_unranked(&self, request: &FeedRequest) -> Result<FeedPage> {
        let mut query = Query::new()
            .order_desc("created_at")
            .limit(request.limit as u32);
        if let Some(cursor) = &request.cursor {
            query = query.cursor_after(cursor.clone());
        }
        let raw = self.store.list(&self.posts_collection, query).await?;
        Ok(to_page(decode_posts(raw.documents), request.limit))
    }

    async fn followed_ids(&self, viewer: &str) -> Result<Vec<String>> {
        let query = Query::new()
            .filter(Filter::equal("follower_id", viewer))
            .limit(1000);
        let page = self.store.list(&self.follows_collection, query).await?;
        Ok(page
            .documents
            .iter()
            .filter_map(|doc| doc.field("followee_id")?.as_str().map(str::to_owned))
            .collect())
    }
}

fn decode_posts(documents: Vec<Document>) -> Vec<Post> {
    documents
        .into_iter()
        .filter_map(|doc| match doc.decode::<Post>() {
            Ok(post) => Some(post),
            Err(err) => {
                warn!(id = %doc.id, error = %err, "skipping undecodable post");
                None
            }
        })
        .collect()
}

fn to_page(items: Vec<Post>, limit: usize) -> FeedPage {
    let has_more = items.len() == limit;
    let next_cursor = items.last().map(|post| post.id.clone());
    FeedPage {
        items,
        next_cursor,
        has_more,
    }
}
