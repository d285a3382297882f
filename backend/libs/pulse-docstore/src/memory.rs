//! In-memory document store
//!
//! Evaluates the full filter/order/cursor/limit semantics in process.
//! Used by the test suites and by services started with
//! `DOCSTORE_MODE=memory`.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::DateTime;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::query::{Filter, Order, Query};
use crate::{Document, DocumentStore, Page, StoreError};

#[derive(Default, Clone)]
pub struct MemoryStore {
    inner: Arc<RwLock<HashMap<String, Vec<Document>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert documents directly, bypassing the trait. Test helper.
    pub async fn seed(&self, collection: &str, documents: Vec<Document>) {
        let mut guard = self.inner.write().await;
        guard
            .entry(collection.to_string())
            .or_default()
            .extend(documents);
    }
}

fn matches(filter: &Filter, doc: &Document) -> bool {
    match filter {
        Filter::Equal { field, value } => doc.field(field) == Some(value),
        Filter::GreaterOrEqual { field, value } => doc
            .field(field)
            .map(|actual| compare_values(actual, value) != Ordering::Less)
            .unwrap_or(false),
        Filter::Contains { field, value } => doc
            .field(field)
            .and_then(Value::as_array)
            .map(|items| items.contains(value))
            .unwrap_or(false),
        Filter::Or { filters } => filters.iter().any(|f| matches(f, doc)),
    }
}

/// Order two JSON scalars. Strings that parse as RFC 3339 timestamps are
/// compared as instants so that fractional-second formatting differences
/// do not leak into the sort order.
fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => {
            match (
                DateTime::parse_from_rfc3339(x),
                DateTime::parse_from_rfc3339(y),
            ) {
                (Ok(dx), Ok(dy)) => dx.cmp(&dy),
                _ => x.cmp(y),
            }
        }
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => Ordering::Equal,
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn list(&self, collection: &str, query: Query) -> Result<Page, StoreError> {
        let guard = self.inner.read().await;
        let mut docs: Vec<Document> = guard
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|doc| query.filters.iter().all(|f| matches(f, doc)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if let Some(order_by) = &query.order_by {
            // stable sort: documents without the field keep insertion order
            docs.sort_by(|a, b| {
                let ord = compare_values(
                    a.field(&order_by.field).unwrap_or(&Value::Null),
                    b.field(&order_by.field).unwrap_or(&Value::Null),
                );
                match order_by.order {
                    Order::Asc => ord,
                    Order::Desc => ord.reverse(),
                }
            });
        }

        let total = docs.len() as u64;

        if let Some(cursor) = &query.cursor_after {
            match docs.iter().position(|d| &d.id == cursor) {
                Some(pos) => {
                    docs.drain(..=pos);
                }
                None => docs.clear(),
            }
        }

        if let Some(limit) = query.limit {
            docs.truncate(limit as usize);
        }

        Ok(Page {
            documents: docs,
            total,
        })
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Document, StoreError> {
        let guard = self.inner.read().await;
        guard
            .get(collection)
            .and_then(|docs| docs.iter().find(|d| d.id == id))
            .cloned()
            .ok_or_else(|| StoreError::not_found(collection, id))
    }

    async fn create(
        &self,
        collection: &str,
        id: &str,
        fields: Value,
    ) -> Result<Document, StoreError> {
        let mut guard = self.inner.write().await;
        let docs = guard.entry(collection.to_string()).or_default();
        if docs.iter().any(|d| d.id == id) {
            return Err(StoreError::BadQuery(format!(
                "document already exists: {}/{}",
                collection, id
            )));
        }
        let doc = Document::new(id, fields);
        docs.push(doc.clone());
        Ok(doc)
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        fields: Value,
    ) -> Result<Document, StoreError> {
        let mut guard = self.inner.write().await;
        let doc = guard
            .get_mut(collection)
            .and_then(|docs| docs.iter_mut().find(|d| d.id == id))
            .ok_or_else(|| StoreError::not_found(collection, id))?;
        match (&mut doc.data, fields) {
            (Value::Object(existing), Value::Object(updates)) => {
                for (key, value) in updates {
                    existing.insert(key, value);
                }
            }
            (data, fields) => *data = fields,
        }
        Ok(doc.clone())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        let mut guard = self.inner.write().await;
        let docs = guard
            .get_mut(collection)
            .ok_or_else(|| StoreError::not_found(collection, id))?;
        let before = docs.len();
        docs.retain(|d| d.id != id);
        if docs.len() == before {
            return Err(StoreError::not_found(collection, id));
        }
        Ok(())
    }
}
