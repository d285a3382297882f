use std::io;
use std::sync::Arc;
use std::time::Duration;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use tracing::info;

use feed_service::config::Config;
use feed_service::handlers::{get_feed, health, stream_feed_updates, FeedHandlerState};
use feed_service::logging::init_tracing;
use feed_service::metrics::metrics_endpoint;
use feed_service::services::{FeedService, FeedWatcher};
use pulse_docstore::{DocumentStore, MemoryStore, RestStore};
use pulse_realtime::{FanoutDispatcher, MemoryTransport, RealtimeTransport, WsTransport};

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
    let transport: Arc<dyn RealtimeTransport> = match config.docstore.mode.as_str() {
        "memory" => Arc::new(MemoryTransport::new()),
        _ => Arc::new(WsTransport::new(&config.realtime.ws_url)),
    };

    let feed = Arc::new(FeedService::new(Arc::clone(&store), &config.feed));
    let dispatcher = Arc::new(FanoutDispatcher::new(transport));
    let watcher = Arc::new(FeedWatcher::new(
        Arc::clone(&dispatcher),
        config.feed.posts_collection.clone(),
    ));

    // periodic best-effort reconnect sweep for active subscriptions
    if config.realtime.refresh_secs > 0 {
        let dispatcher = Arc::clone(&dispatcher);
        let interval = Duration::from_secs(config.realtime.refresh_secs);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                dispatcher.refresh().await;
            }
        });
    }

    let state = web::Data::new(FeedHandlerState {
        feed,
        watcher,
        default_page_size: config.feed.default_page_size,
        max_page_size: config.feed.max_page_size,
    });

    info!(port = config.app.port, "feed-service listening");

    HttpServer::new(move || {
        App::new()
            .wrap(Cors::permissive())
            .app_data(state.clone())
            .service(get_feed)
            .service(stream_feed_updates)
            .service(health)
            .service(metrics_endpoint)
    })
    .bind(("0.0.0.0", config.app.port))?
    .run()
    .await
}
