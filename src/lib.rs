//! Periodic RSS/Atom synchronizer.
//!
//! Feeds are re-checked on an adaptive per-feed interval, new items are
//! deduplicated by URL and stored sanitized, and site icons are cached per
//! domain. [`engine::FeedEngine`] is the entry point; [`scheduler::Scheduler`]
//! drives it in the background.

pub mod config;
pub mod engine;
pub mod feed;
pub mod icon;
pub mod scheduler;
pub mod storage;
pub mod util;

pub use config::{Config, ConfigError};
pub use engine::{FeedEngine, FeedPassReport};
pub use scheduler::Scheduler;
