use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A direct-message thread. Membership is a set of user ids, not the
/// comma-joined string some older backends used for the same data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatThread {
    pub id: String,
    #[serde(default)]
    pub member_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl ChatThread {
    pub fn has_member(&self, user_id: &str) -> bool {
        self.member_ids.iter().any(|id| id == user_id)
    }
}

/// A chat message. Created once by its sender; afterwards only the
/// reader set grows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub thread_id: String,
    pub sender_id: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub read_by: Vec<String>,
    #[serde(rename = "type", default)]
    pub message_type: String,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn is_read_by(&self, user_id: &str) -> bool {
        self.read_by.iter().any(|id| id == user_id)
    }
}

/// Badge counts as rendered by the client, both capped at 99.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Badges {
    pub chats: u32,
    pub notifications: u32,
}
