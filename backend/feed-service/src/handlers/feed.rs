use actix_web::{get, web, HttpRequest, HttpResponse};
use base64::{engine::general_purpose, Engine as _};
use serde::Deserialize;
use std::sync::Arc;
use tracing::warn;

use crate::error::{AppError, Result};
use crate::metrics;
use crate::models::{FeedPage, FeedRequest, FeedType};
use crate::services::{FeedService, FeedWatcher};

#[derive(Debug, Deserialize)]
pub struct FeedQueryParams {
    #[serde(rename = "type", default = "default_feed_type")]
    pub feed_type: String,
    pub limit: Option<u32>,
    pub cursor: Option<String>,
}

fn default_feed_type() -> String {
    "home".to_string()
}

pub struct FeedHandlerState {
    pub feed: Arc<FeedService>,
    pub watcher: Arc<FeedWatcher>,
    pub default_page_size: u32,
    pub max_page_size: u32,
}

/// Wire cursors are base64 so clients treat them as opaque tokens.
fn encode_cursor(id: &str) -> String {
    general_purpose::STANDARD.encode(id)
}

fn decode_cursor(cursor: Option<&str>) -> Result<Option<String>> {
    match cursor {
        Some(cursor) if !cursor.is_empty() => {
            let decoded = general_purpose::STANDARD
                .decode(cursor)
                .map_err(|_| AppError::BadRequest("invalid cursor format".to_string()))?;
            let id = String::from_utf8(decoded)
                .map_err(|_| AppError::BadRequest("invalid cursor encoding".to_string()))?;
            Ok(Some(id))
        }
        _ => Ok(None),
    }
}

fn viewer_from(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get("X-User-Id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
}

#[get("/api/feed")]
pub async fn get_feed(
    query: web::Query<FeedQueryParams>,
    http_req: HttpRequest,
    state: web::Data<FeedHandlerState>,
) -> Result<HttpResponse> {
    let feed_type: FeedType = query
        .feed_type
        .parse()
        .map_err(AppError::BadRequest)?;
    let limit = query
        .limit
        .unwrap_or(state.default_page_size)
        .clamp(1, state.max_page_size) as usize;
    let cursor = decode_cursor(query.cursor.as_deref())?;
    let viewer_id = viewer_from(&http_req);

    if feed_type == FeedType::Following && viewer_id.is_none() {
        return Err(AppError::AuthRequired);
    }

    metrics::FEED_REQUESTS
        .with_label_values(&[feed_type.as_str()])
        .inc();

    let request = FeedRequest {
        limit,
        cursor,
        viewer_id,
        followed_ids: None,
    };

    let page = match state.feed.fetch_feed(feed_type, &request).await {
        Ok(page) => page,
        Err(err @ AppError::AuthRequired) => return Err(err),
        Err(err) => {
            // ranked and fallback both failed: the screen shows its empty
            // state ("No posts yet"), never an error banner
            warn!(
                feed_type = feed_type.as_str(),
                error = %err,
                "feed unavailable after fallback, serving empty page"
            );
            metrics::FEED_EMPTY_PAGES
                .with_label_values(&[feed_type.as_str()])
                .inc();
            FeedPage::empty()
        }
    };

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "items": page.items,
        "next_cursor": page.next_cursor.as_deref().map(encode_cursor),
        "has_more": page.has_more,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_codec_round_trips() {
        let encoded = encode_cursor("post-123");
        assert_eq!(decode_cursor(Some(&encoded)).unwrap().as_deref(), Some("post-123"));
    }

    #[test]
    fn empty_cursor_means_first_page() {
        assert_eq!(decode_cursor(None).unwrap(), None);
        assert_eq!(decode_cursor(Some("")).unwrap(), None);
    }

    #[test]
    fn garbage_cursor_is_a_bad_request() {
        assert!(matches!(
            decode_cursor(Some("not base64 !!!")),
            Err(AppError::BadRequest(_))
        ));
    }
}
