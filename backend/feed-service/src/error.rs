use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use thiserror::Error;

use pulse_docstore::StoreError;
use pulse_realtime::RealtimeError;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("authentication required")]
    AuthRequired,

    /// The store query behind a feed failed. Recovered one layer up by the
    /// unranked fallback; only surfaces when the fallback fails too.
    #[error("feed unavailable: {0}")]
    FeedUnavailable(String),

    #[error("subscription transport error: {0}")]
    Subscription(String),

    #[error("internal server error")]
    Internal,
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::FeedUnavailable(err.to_string())
    }
}

impl From<RealtimeError> for AppError {
    fn from(err: RealtimeError) -> Self {
        AppError::Subscription(err.to_string())
    }
}

impl AppError {
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::BadRequest(_) => 400,
            AppError::AuthRequired => 401,
            AppError::FeedUnavailable(_) | AppError::Subscription(_) => 503,
            AppError::Config(_) | AppError::Internal => 500,
        }
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let status = StatusCode::from_u16(self.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        HttpResponse::build(status).json(serde_json::json!({
            "error": self.to_string(),
        }))
    }
}
