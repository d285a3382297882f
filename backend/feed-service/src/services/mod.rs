pub mod feed;
pub mod ranking;
pub mod session;
pub mod watcher;

pub use feed::FeedService;
pub use session::{FeedSession, LoadOutcome};
pub use watcher::FeedWatcher;
