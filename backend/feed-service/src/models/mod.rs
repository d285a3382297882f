use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostKind {
    Standard,
    Video,
    Reel,
    News,
    Live,
}

/// A post as stored in the posts collection. Content is immutable after
/// creation; only the engagement counters mutate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub author_id: String,
    pub kind: PostKind,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub media_urls: Vec<String>,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub likes: u64,
    #[serde(default)]
    pub comments: u64,
    #[serde(default)]
    pub reposts: u64,
    #[serde(default)]
    pub impressions: u64,
    #[serde(default)]
    pub views: u64,
    pub created_at: DateTime<Utc>,
}

impl Post {
    /// Whether the post carries a playable video reference.
    pub fn has_video(&self) -> bool {
        self.video_url.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedType {
    Home,
    Watch,
    Reels,
    Following,
    News,
    Default,
}

impl FeedType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedType::Home => "home",
            FeedType::Watch => "watch",
            FeedType::Reels => "reels",
            FeedType::Following => "following",
            FeedType::News => "news",
            FeedType::Default => "default",
        }
    }

    /// Scored feeds over-fetch candidates before ranking; chronological
    /// feeds page straight through the query window.
    pub fn is_scored(&self) -> bool {
        matches!(self, FeedType::Home | FeedType::Watch | FeedType::Reels)
    }
}

impl std::str::FromStr for FeedType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "home" => Ok(FeedType::Home),
            "watch" => Ok(FeedType::Watch),
            "reels" => Ok(FeedType::Reels),
            "following" => Ok(FeedType::Following),
            "news" => Ok(FeedType::News),
            "default" => Ok(FeedType::Default),
            other => Err(format!("unknown feed type: {}", other)),
        }
    }
}

/// One page of a feed.
///
/// `next_cursor` is the id of the last returned item; `has_more` is the
/// returned-count == requested-size heuristic (an exactly-full last page
/// costs one extra empty round trip).
#[derive(Debug, Clone, Serialize)]
pub struct FeedPage {
    pub items: Vec<Post>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

impl FeedPage {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            next_cursor: None,
            has_more: false,
        }
    }
}

/// Parameters for one feed fetch.
#[derive(Debug, Clone, Default)]
pub struct FeedRequest {
    pub limit: usize,
    pub cursor: Option<String>,
    pub viewer_id: Option<String>,
    /// Pre-resolved followed author ids. When `None` the service resolves
    /// them from the follows collection for the `following` feed.
    pub followed_ids: Option<Vec<String>>,
}
