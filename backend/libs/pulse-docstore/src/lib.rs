//! Generic document-store client
//!
//! The hosted backend exposes named collections of JSON documents queried
//! with a small filter language (equality, range, array membership, logical
//! OR) plus ordering, limit and cursor-after-id pagination. This crate
//! defines the client trait consumed by the services, a REST-backed
//! implementation for the hosted backend, and an in-memory implementation
//! used by tests and local development.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod error;
pub mod memory;
pub mod query;
pub mod rest;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use query::{Filter, Order, OrderBy, Query};
pub use rest::RestStore;

/// A single document in a collection.
///
/// `data` holds the document fields; the id is kept alongside so callers
/// can paginate and address documents without digging into the payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    #[serde(default)]
    pub data: Value,
}

impl Document {
    pub fn new(id: impl Into<String>, data: Value) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }

    /// Borrow a top-level field, if present.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.data.get(name)
    }

    /// Deserialize the document into a typed model.
    ///
    /// The document id is injected under the `id` key when the payload does
    /// not already carry one.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, StoreError> {
        let mut value = self.data.clone();
        if let Value::Object(map) = &mut value {
            map.entry("id")
                .or_insert_with(|| Value::String(self.id.clone()));
        }
        serde_json::from_value(value).map_err(|e| StoreError::Decode(e.to_string()))
    }
}

/// One page of query results.
///
/// `total` is the number of documents matching the filters, independent of
/// `limit` and cursor position.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Page {
    pub documents: Vec<Document>,
    pub total: u64,
}

/// Client interface over the hosted collection store.
///
/// Implementations must be cheap to clone behind an `Arc` and safe to share
/// across tasks; services receive them by dependency injection rather than
/// through a process-global singleton.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn list(&self, collection: &str, query: Query) -> Result<Page, StoreError>;

    async fn get(&self, collection: &str, id: &str) -> Result<Document, StoreError>;

    async fn create(&self, collection: &str, id: &str, fields: Value)
        -> Result<Document, StoreError>;

    /// Merge `fields` into the existing document (top-level keys only).
    async fn update(&self, collection: &str, id: &str, fields: Value)
        -> Result<Document, StoreError>;

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError>;
}
