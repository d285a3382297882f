pub mod unread;

pub use unread::UnreadAggregator;
