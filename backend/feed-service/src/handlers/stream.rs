//! Server-sent events surface over the feed watcher.
//!
//! Clients hold the stream open and re-fetch the feed whenever a
//! `feed-changed` event arrives. Closing the response drops the
//! subscription, which in turn releases the shared transport connection
//! once the last watcher is gone.

use actix_web::{get, web, HttpResponse};
use futures::StreamExt;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::error::{AppError, Result};
use crate::handlers::feed::FeedHandlerState;
use crate::models::FeedType;

#[derive(Debug, Deserialize)]
pub struct StreamQueryParams {
    #[serde(rename = "type", default = "default_feed_type")]
    pub feed_type: String,
}

fn default_feed_type() -> String {
    "home".to_string()
}

#[get("/api/feed/stream")]
pub async fn stream_feed_updates(
    query: web::Query<StreamQueryParams>,
    state: web::Data<FeedHandlerState>,
) -> Result<HttpResponse> {
    let feed_type: FeedType = query
        .feed_type
        .parse()
        .map_err(AppError::BadRequest)?;

    let (tx, rx) = mpsc::unbounded_channel::<web::Bytes>();
    let subscription = state
        .watcher
        .watch(feed_type, move |changed: FeedType| {
            let frame = format!("event: feed-changed\ndata: {}\n\n", changed.as_str());
            let _ = tx.send(web::Bytes::from(frame));
        })
        .await?;

    // the closure owns the subscription, so client disconnect tears the
    // listener down and the channel with it
    let body = UnboundedReceiverStream::new(rx).map(move |bytes| {
        let _keep_alive = &subscription;
        Ok::<_, actix_web::Error>(bytes)
    });

    Ok(HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(("Cache-Control", "no-cache"))
        .streaming(body))
}
