use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A change event as delivered by the realtime transport.
///
/// `events` entries encode the mutation kind with substring markers, e.g.
/// `collections.posts.documents.abc.create`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub events: Vec<String>,
    pub payload: Value,
}

impl ChangeEvent {
    pub fn is_create(&self) -> bool {
        self.marker(".create")
    }

    pub fn is_update(&self) -> bool {
        self.marker(".update")
    }

    pub fn is_delete(&self) -> bool {
        self.marker(".delete")
    }

    fn marker(&self, needle: &str) -> bool {
        self.events.iter().any(|e| e.contains(needle))
    }
}

/// Identifies a watched collection, or a single document within one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WatchKey {
    pub collection: String,
    pub document_id: Option<String>,
}

impl WatchKey {
    pub fn collection(name: impl Into<String>) -> Self {
        Self {
            collection: name.into(),
            document_id: None,
        }
    }

    pub fn document(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            document_id: Some(id.into()),
        }
    }

    /// Transport channel name for this key.
    pub fn channel(&self) -> String {
        match &self.document_id {
            Some(id) => format!("collections.{}.documents.{}", self.collection, id),
            None => format!("collections.{}.documents", self.collection),
        }
    }
}
