use std::time::Duration;

use thiserror::Error;

use crate::storage::{Database, DatabaseError, Feed, FeedRef, NewFeed};
use crate::util::{self, UrlValidationError};

use super::fetcher::{self, FetchError};
use super::ingest::ItemIngestor;
use super::interval::PollPolicy;

/// Errors that escape a sync.
///
/// Fetch and parse failures are not among them: they are folded into
/// [`SyncOutcome::Failed`] and only become an error for callers that asked
/// for one, such as adding a new feed.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Feed #{0} not found")]
    FeedNotFound(i64),
    #[error("Invalid feed URL: {0}")]
    InvalidUrl(#[from] UrlValidationError),
    #[error("Feed {url} is unreachable: {source}")]
    Unreachable {
        url: String,
        #[source]
        source: FetchError,
    },
    #[error(transparent)]
    Store(#[from] DatabaseError),
}

/// What a single `sync` call did
#[derive(Debug)]
pub enum SyncOutcome {
    /// Not due yet and not forced; the store was not touched
    Skipped { feed_id: i64, due_in: i64 },
    /// New items were stored and the interval shortened
    Updated {
        feed_id: i64,
        new_items: usize,
        poll_interval: i64,
    },
    /// Fetched fine but nothing new; the interval was stretched
    NoUpdate { feed_id: i64, poll_interval: i64 },
    /// Fetch or parse failed; treated like `NoUpdate` for scheduling
    Failed {
        feed_id: i64,
        error: FetchError,
        poll_interval: i64,
    },
}

impl SyncOutcome {
    pub fn feed_id(&self) -> i64 {
        match self {
            SyncOutcome::Skipped { feed_id, .. }
            | SyncOutcome::Updated { feed_id, .. }
            | SyncOutcome::NoUpdate { feed_id, .. }
            | SyncOutcome::Failed { feed_id, .. } => *feed_id,
        }
    }
}

/// Knobs for fetching and interval control
#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub policy: PollPolicy,
    pub fetch_timeout: Duration,
    pub max_feed_bytes: usize,
    /// Permit loopback and private-network feed URLs
    pub allow_private_hosts: bool,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            policy: PollPolicy::default(),
            fetch_timeout: Duration::from_secs(30),
            max_feed_bytes: 10 * 1024 * 1024,
            allow_private_hosts: false,
        }
    }
}

/// Per-feed fetch, parse, ingest and reschedule.
pub struct FeedSyncer {
    db: Database,
    client: reqwest::Client,
    ingestor: ItemIngestor,
    settings: SyncSettings,
}

impl FeedSyncer {
    pub fn new(db: Database, client: reqwest::Client, settings: SyncSettings) -> Self {
        Self {
            ingestor: ItemIngestor::new(db.clone()),
            db,
            client,
            settings,
        }
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    pub async fn sync(&self, feed: &FeedRef, force: bool) -> Result<SyncOutcome, SyncError> {
        self.sync_at(feed, force, util::now_ms()).await
    }

    /// Sync one feed as of `now` (Unix ms).
    ///
    /// A URL that is not yet tracked is added first; an unknown id is an error.
    pub async fn sync_at(
        &self,
        feed: &FeedRef,
        force: bool,
        now: i64,
    ) -> Result<SyncOutcome, SyncError> {
        let feed = match feed {
            FeedRef::Id(id) => self
                .db
                .get_feed_by_id(*id)
                .await?
                .ok_or(SyncError::FeedNotFound(*id))?,
            FeedRef::Url(url) => {
                let url = url.trim();
                match self.db.get_feed_by_url(url).await? {
                    Some(feed) => feed,
                    None => self.ensure_feed(url).await?,
                }
            }
        };

        self.sync_record(feed, force, now).await
    }

    /// Return the feed for `url`, inserting a fresh row if there is none.
    ///
    /// Surrounding whitespace is not part of the key. Concurrent callers with
    /// the same URL get the same row.
    pub async fn ensure_feed(&self, url: &str) -> Result<Feed, SyncError> {
        let url = url.trim();
        let parsed = util::validate_feed_url(url, self.settings.allow_private_hosts)?;
        let domain = util::domain_of(parsed.as_str()).ok_or(UrlValidationError::MissingHost)?;

        let id = self
            .db
            .insert_feed(&NewFeed {
                url: url.to_string(),
                title: String::new(),
                domain,
                poll_interval: self.settings.policy.min_ms,
            })
            .await?;

        self.db
            .get_feed_by_id(id)
            .await?
            .ok_or(SyncError::FeedNotFound(id))
    }

    async fn sync_record(
        &self,
        mut feed: Feed,
        force: bool,
        now: i64,
    ) -> Result<SyncOutcome, SyncError> {
        let due_in = feed.due_in(now);
        if !force && due_in > 0 {
            tracing::trace!(feed_id = feed.id, due_in, "Feed not due");
            return Ok(SyncOutcome::Skipped {
                feed_id: feed.id,
                due_in,
            });
        }

        let elapsed = now.saturating_sub(feed.last_check);
        let fetched = fetcher::fetch_feed(
            &self.client,
            &feed.url,
            self.settings.fetch_timeout,
            self.settings.max_feed_bytes,
        )
        .await;

        let (new_items, updated, failure) = match fetched {
            Ok(parsed) => {
                if let Some(title) = parsed.title {
                    feed.title = title;
                }
                let report = self.ingestor.ingest(feed.id, &parsed.items, now).await?;
                if report.skipped > 0 {
                    tracing::debug!(
                        feed_id = feed.id,
                        skipped = report.skipped,
                        "Dropped items without link"
                    );
                }
                if let Some(latest) = report.max_new_item_date {
                    feed.last_update = latest;
                }
                (report.inserted, report.has_new_items(), None)
            }
            Err(error) => {
                tracing::warn!(feed_id = feed.id, url = %feed.url, error = %error, "Feed fetch failed");
                (0, false, Some(error))
            }
        };

        feed.poll_interval = self
            .settings
            .policy
            .next_interval(elapsed, updated);
        feed.last_check = now;
        self.db.update_feed(&feed).await?;

        tracing::debug!(
            feed_id = feed.id,
            new_items,
            poll_interval = feed.poll_interval,
            "Feed synced"
        );

        let (feed_id, poll_interval) = (feed.id, feed.poll_interval);
        Ok(match failure {
            Some(error) => SyncOutcome::Failed {
                feed_id,
                error,
                poll_interval,
            },
            None if updated => SyncOutcome::Updated {
                feed_id,
                new_items,
                poll_interval,
            },
            None => SyncOutcome::NoUpdate {
                feed_id,
                poll_interval,
            },
        })
    }
}
