use std::sync::Arc;

use actix_web::{get, web, HttpResponse};

use crate::error::Result;
use crate::metrics;
use crate::services::UnreadAggregator;

pub struct BadgeHandlerState {
    pub aggregator: Arc<UnreadAggregator>,
}

/// GET /api/badges/{user_id}
///
/// Always 200: aggregation failures show up as zero counts, not as an
/// error indicator on the badge.
#[get("/api/badges/{user_id}")]
pub async fn get_badges(
    state: web::Data<BadgeHandlerState>,
    user_id: web::Path<String>,
) -> Result<HttpResponse> {
    metrics::BADGE_REQUESTS.inc();
    let badges = state.aggregator.badges(&user_id).await;
    Ok(HttpResponse::Ok().json(badges))
}

#[get("/health")]
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}
