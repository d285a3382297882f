use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum StoreError {
    #[error("store transport error: {0}")]
    Transport(String),

    #[error("document not found: {collection}/{id}")]
    NotFound { collection: String, id: String },

    #[error("bad query: {0}")]
    BadQuery(String),

    #[error("decode error: {0}")]
    Decode(String),
}

impl StoreError {
    pub fn not_found(collection: &str, id: &str) -> Self {
        StoreError::NotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        }
    }
}
