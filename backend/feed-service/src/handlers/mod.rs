pub mod feed;
pub mod stream;

pub use feed::{get_feed, FeedHandlerState};
pub use stream::stream_feed_updates;

use actix_web::{get, HttpResponse};

#[get("/health")]
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}
