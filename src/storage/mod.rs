mod feeds;
mod icons;
mod items;
mod schema;
mod types;

pub use schema::Database;
pub use types::{
    DatabaseError, Feed, FeedItem, FeedRef, FeedSummary, Icon, ItemFilter, NewFeed, NewFeedItem,
};
