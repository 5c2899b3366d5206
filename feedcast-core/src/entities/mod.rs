pub mod feed;

pub use feed::{Feed, InsertFeed, ListFeeds};
