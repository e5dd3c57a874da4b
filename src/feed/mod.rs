//! Feed retrieval and synchronization.
//!
//! - [`parser`] - reduce RSS/Atom/JSON Feed documents with `feed-rs`
//! - [`fetcher`] - bounded HTTP GET with timeout and size limit
//! - [`sanitize`] - allowlist HTML cleaning of item content
//! - [`ingest`] - URL-keyed dedup and persistence of items
//! - [`interval`] - the adaptive poll-interval controller
//! - [`syncer`] - the per-feed state machine tying the above together
//!
//! # Example
//!
//! ```ignore
//! let syncer = FeedSyncer::new(db, client, SyncSettings::default());
//! match syncer.sync(&FeedRef::Id(1), false).await? {
//!     SyncOutcome::Updated { new_items, .. } => println!("{new_items} new"),
//!     other => println!("{other:?}"),
//! }
//! ```

pub mod fetcher;
pub mod ingest;
pub mod interval;
pub mod parser;
pub mod sanitize;
pub mod syncer;

pub use fetcher::FetchError;
pub use ingest::{IngestReport, ItemIngestor};
pub use interval::PollPolicy;
pub use parser::{parse_feed, ParsedFeed, ParsedItem};
pub use sanitize::Sanitizer;
pub use syncer::{FeedSyncer, SyncError, SyncOutcome, SyncSettings};
