use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub docstore: DocstoreConfig,
    pub realtime: RealtimeConfig,
    pub feed: FeedConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub env: String,
    pub port: u16,
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocstoreConfig {
    /// "rest" against DOCSTORE_BASE_URL, or "memory" for local development.
    pub mode: String,
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    pub ws_url: String,
    /// Interval for the best-effort reconnect sweep, 0 disables it.
    pub refresh_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    pub posts_collection: String,
    pub follows_collection: String,
    pub default_page_size: u32,
    pub max_page_size: u32,
    /// Scored feeds fetch `overfetch_factor * page_size` candidates before
    /// ranking discards everything outside the top page.
    pub overfetch_factor: u32,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        Ok(Config {
            app: AppConfig {
                env: env_or("APP_ENV", "development"),
                port: parse_env("APP_PORT", 8004)?,
                log_level: env_or("LOG_LEVEL", "info"),
            },
            docstore: DocstoreConfig {
                mode: env_or("DOCSTORE_MODE", "rest"),
                base_url: env_or("DOCSTORE_BASE_URL", "http://127.0.0.1:7700"),
            },
            realtime: RealtimeConfig {
                ws_url: env_or("REALTIME_WS_URL", "ws://127.0.0.1:7701/v1/realtime"),
                refresh_secs: parse_env("REALTIME_REFRESH_SECS", 300)?,
            },
            feed: FeedConfig {
                posts_collection: env_or("POSTS_COLLECTION", "posts"),
                follows_collection: env_or("FOLLOWS_COLLECTION", "follows"),
                default_page_size: parse_env("FEED_DEFAULT_PAGE_SIZE", 20)?,
                max_page_size: parse_env("FEED_MAX_PAGE_SIZE", 100)?,
                overfetch_factor: parse_env("FEED_OVERFETCH_FACTOR", 2)?,
            },
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T, AppError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| AppError::Config(format!("invalid value for {}: {}", key, raw))),
        Err(_) => Ok(default),
    }
}
