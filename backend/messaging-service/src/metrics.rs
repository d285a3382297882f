use actix_web::{get, HttpResponse};
use once_cell::sync::Lazy;
use prometheus::{
    register_int_counter, register_int_counter_vec, Encoder, IntCounter, IntCounterVec,
    TextEncoder,
};

pub static BADGE_REQUESTS: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("badge_requests_total", "Badge lookups served")
        .expect("register badge_requests_total")
});

pub static AGGREGATION_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "badge_aggregation_failures_total",
        "Badge metrics that failed open to zero",
        &["metric"]
    )
    .expect("register badge_aggregation_failures_total")
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
