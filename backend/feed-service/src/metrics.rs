use actix_web::{get, HttpResponse};
use once_cell::sync::Lazy;
use prometheus::{register_int_counter_vec, Encoder, IntCounterVec, TextEncoder};

pub static FEED_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "feed_requests_total",
        "Feed page requests by feed type",
        &["feed_type"]
    )
    .expect("register feed_requests_total")
});

pub static FEED_FALLBACKS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "feed_fallbacks_total",
        "Ranked queries that degraded to the unranked fallback",
        &["feed_type"]
    )
    .expect("register feed_fallbacks_total")
});

pub static FEED_EMPTY_PAGES: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "feed_empty_pages_total",
        "Requests served the empty state after the fallback also failed",
        &["feed_type"]
    )
    .expect("register feed_empty_pages_total")
});

#[get("/metrics")]
pub async fn metrics_endpoint() -> HttpResponse {
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if TextEncoder::new()
        .encode(&metric_families, &mut buffer)
        .is_err()
    {
        return HttpResponse::InternalServerError().finish();
    }
    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(buffer)
}
