use serde::Serialize;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Database-specific errors with user-friendly messages
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Another process holds the database lock
    #[error("The feed database is locked by another process. Please try again.")]
    InstanceLocked,

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Check if a sqlx error indicates database locking
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        if is_lock_message(&err.to_string()) {
            return DatabaseError::InstanceLocked;
        }
        DatabaseError::Other(err)
    }
}

/// SQLITE_BUSY (5), SQLITE_LOCKED (6) and SQLITE_CANTOPEN (14) all surface
/// through the error message only.
pub(crate) fn is_lock_message(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("database is locked")
        || message.contains("database table is locked")
        || message.contains("sqlite_busy")
        || message.contains("sqlite_locked")
        || message.contains("unable to open database file")
}

// ============================================================================
// Lookup Keys
// ============================================================================

/// Identifies a feed either by its row id or by its (unique) source URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedRef {
    Id(i64),
    Url(String),
}

impl From<i64> for FeedRef {
    fn from(id: i64) -> Self {
        FeedRef::Id(id)
    }
}

impl From<&str> for FeedRef {
    fn from(url: &str) -> Self {
        FeedRef::Url(url.to_string())
    }
}

impl From<String> for FeedRef {
    fn from(url: String) -> Self {
        FeedRef::Url(url)
    }
}

impl std::fmt::Display for FeedRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeedRef::Id(id) => write!(f, "#{id}"),
            FeedRef::Url(url) => f.write_str(url),
        }
    }
}

// ============================================================================
// Data Structures
// ============================================================================

/// A tracked syndication source.
///
/// All timestamps and `poll_interval` are Unix milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Feed {
    pub id: i64,
    pub url: String,
    pub title: String,
    /// Site host, used as the icon cache key
    pub domain: String,
    /// Last sync attempt (success or failure)
    pub last_check: i64,
    /// Published time of the most recent item discovered
    pub last_update: i64,
    /// Current adaptive delay before the next check
    pub poll_interval: i64,
}

impl Feed {
    /// Milliseconds until this feed is due again (negative or zero means due).
    pub fn due_in(&self, now: i64) -> i64 {
        self.last_check
            .saturating_add(self.poll_interval)
            .saturating_sub(now)
    }
}

/// Values for a feed row that does not exist yet.
#[derive(Debug, Clone)]
pub struct NewFeed {
    pub url: String,
    pub title: String,
    pub domain: String,
    pub poll_interval: i64,
}

/// Feed with aggregate item count, as listed to clients
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct FeedSummary {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub feed: Feed,
    pub total: i64,
}

/// One entry discovered from a feed. `url` is the store-wide dedup key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct FeedItem {
    pub id: i64,
    pub feed_id: i64,
    pub title: String,
    pub url: String,
    /// Sanitized HTML
    pub content: String,
    pub published: i64,
    pub last_seen: i64,
}

/// Values for an item row about to be inserted.
#[derive(Debug, Clone)]
pub struct NewFeedItem {
    pub feed_id: i64,
    pub title: String,
    pub url: String,
    pub content: String,
    pub published: i64,
    pub last_seen: i64,
}

/// Cached site icon, keyed by domain.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Icon {
    pub id: i64,
    pub domain: String,
    pub data: Vec<u8>,
}

/// Filter for item listing. Unset fields do not constrain the query.
#[derive(Debug, Clone, Default)]
pub struct ItemFilter {
    pub feed: Option<i64>,
    /// Only items published at or after this time (ms)
    pub min_date: Option<i64>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}
