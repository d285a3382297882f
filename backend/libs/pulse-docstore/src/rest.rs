//! REST client for the hosted collection store.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use tracing::warn;

use crate::query::Query;
use crate::{Document, DocumentStore, Page, StoreError};

#[derive(Clone)]
pub struct RestStore {
    http: reqwest::Client,
    base_url: String,
}

impl RestStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn collection_url(&self, collection: &str) -> String {
        format!("{}/v1/collections/{}", self.base_url, collection)
    }

    fn document_url(&self, collection: &str, id: &str) -> String {
        format!("{}/documents/{}", self.collection_url(collection), id)
    }

    async fn check(
        response: reqwest::Response,
        collection: &str,
        id: &str,
    ) -> Result<reqwest::Response, StoreError> {
        match response.status() {
            status if status.is_success() => Ok(response),
            StatusCode::NOT_FOUND => Err(StoreError::not_found(collection, id)),
            StatusCode::BAD_REQUEST => {
                let body = response.text().await.unwrap_or_default();
                warn!(collection, body = %body, "store rejected the query");
                Err(StoreError::BadQuery(body))
            }
            status => {
                warn!(collection, id, status = %status, "unexpected status from store");
                Err(StoreError::Transport(format!(
                    "unexpected status {} from store",
                    status
                )))
            }
        }
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        StoreError::Transport(err.to_string())
    }
}

#[async_trait]
impl DocumentStore for RestStore {
    async fn list(&self, collection: &str, query: Query) -> Result<Page, StoreError> {
        let response = self
            .http
            .post(format!("{}/query", self.collection_url(collection)))
            .json(&query)
            .send()
            .await?;
        let response = Self::check(response, collection, "").await?;
        response
            .json::<Page>()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Document, StoreError> {
        let response = self.http.get(self.document_url(collection, id)).send().await?;
        let response = Self::check(response, collection, id).await?;
        response
            .json::<Document>()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))
    }

    async fn create(
        &self,
        collection: &str,
        id: &str,
        fields: Value,
    ) -> Result<Document, StoreError> {
        let response = self
            .http
            .post(self.document_url(collection, id))
            .json(&fields)
            .send()
            .await?;
        let response = Self::check(response, collection, id).await?;
        response
            .json::<Document>()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        fields: Value,
    ) -> Result<Document, StoreError> {
        let response = self
            .http
            .patch(self.document_url(collection, id))
            .json(&fields)
            .send()
            .await?;
        let response = Self::check(response, collection, id).await?;
        response
            .json::<Document>()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        let response = self
            .http
            .delete(self.document_url(collection, id))
            .send()
            .await?;
        Self::check(response, collection, id).await?;
        Ok(())
    }
}
