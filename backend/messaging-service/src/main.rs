use std::io;
use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use tracing::info;

use messaging_service::config::Config;
use messaging_service::handlers::{get_badges, health, BadgeHandlerState};
use messaging_service::logging::init_tracing;
use messaging_service::metrics::metrics_endpoint;
use messaging_service::services::UnreadAggregator;
use pulse_docstore::{DocumentStore, MemoryStore, RestStore};

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = Config::from_env()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;

    let store: Arc<dyn DocumentStore> = match config.docstore.mode.as_str() {
        "memory" => Arc::new(MemoryStore::new()),
        _ => Arc::new(RestStore::new(&config.docstore.base_url)),
    };
    let aggregator = Arc::new(UnreadAggregator::new(store, &config.collections));

    let state = web::Data::new(BadgeHandlerState { aggregator });

    info!(port = config.app.port, "messaging-service listening");

    HttpServer::new(move || {
        App::new()
            .wrap(Cors::permissive())
            .app_data(state.clone())
            .service(get_badges)
            .service(health)
            .service(metrics_endpoint)
    })
    .bind(("0.0.0.0", config.app.port))?
    .run()
    .await
}
