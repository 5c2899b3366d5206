pub mod feed;
pub mod ws;

pub use feed::{CreateFeedRequest, FeedResponse, SearchFeedsQuery};
pub use ws::{WsCloseCode, WsServerMessage};
