use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub docstore: DocstoreConfig,
    pub collections: CollectionsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub env: String,
    pub port: u16,
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocstoreConfig {
    pub mode: String,
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionsConfig {
    pub threads: String,
    pub messages: String,
    pub notifications: String,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        Ok(Config {
            app: AppConfig {
                env: env_or("APP_ENV", "development"),
                port: parse_env("APP_PORT", 8005)?,
                log_level: env_or("LOG_LEVEL", "info"),
            },
            docstore: DocstoreConfig {
                mode: env_or("DOCSTORE_MODE", "rest"),
                base_url: env_or("DOCSTORE_BASE_URL", "http://127.0.0.1:7700"),
            },
            collections: CollectionsConfig {
                threads: env_or("THREADS_COLLECTION", "threads"),
                messages: env_or("MESSAGES_COLLECTION", "messages"),
                notifications: env_or("NOTIFICATIONS_COLLECTION", "notifications"),
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
