//! The facade API and CLI callers use.
//!
//! [`FeedEngine`] owns the store handle, the feed syncer and the icon
//! resolver. Everything that mutates feeds goes through it; `get_feeds` and
//! `get_items` are plain store reads.

use reqwest::redirect::Policy;

use crate::feed::{FeedSyncer, SyncError, SyncOutcome, SyncSettings};
use crate::icon::{IconPass, IconPassReport, IconResolver, IconSettings};
use crate::storage::{Database, DatabaseError, Feed, FeedItem, FeedRef, FeedSummary, ItemFilter};
use crate::util;

/// Maximum redirects followed for feed and icon requests
const MAX_REDIRECTS: usize = 5;

/// Build the shared HTTP client.
///
/// Per-request timeouts are applied by the callers; the client-level timeout
/// only backstops requests made without one.
pub fn build_http_client(user_agent: &str) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .user_agent(user_agent)
        .redirect(create_redirect_policy())
        .pool_max_idle_per_host(2)
        .pool_idle_timeout(std::time::Duration::from_secs(30))
        .tcp_keepalive(std::time::Duration::from_secs(60))
        .timeout(std::time::Duration::from_secs(120))
        .build()
}

fn create_redirect_policy() -> Policy {
    Policy::custom(|attempt| {
        if attempt.previous().len() >= MAX_REDIRECTS {
            return attempt.error(format!("Too many redirects (max {MAX_REDIRECTS})"));
        }

        let url = attempt.url();
        if attempt.previous().iter().any(|prev| prev.as_str() == url.as_str()) {
            return attempt.error("Redirect loop detected");
        }

        tracing::debug!(
            from = %attempt.previous().last().map(|u| u.as_str()).unwrap_or("initial"),
            to = %url,
            hop = attempt.previous().len() + 1,
            "Following redirect"
        );

        attempt.follow()
    })
}

/// Totals for one feed-sync pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedPassReport {
    pub updated: usize,
    pub unchanged: usize,
    pub skipped: usize,
    /// Fetch or parse failures (rescheduled with backoff)
    pub failed: usize,
    /// Feeds abandoned because of a store error
    pub errors: usize,
    pub new_items: usize,
}

impl FeedPassReport {
    fn record(&mut self, outcome: &SyncOutcome) {
        match outcome {
            SyncOutcome::Skipped { .. } => self.skipped += 1,
            SyncOutcome::Updated { new_items, .. } => {
                self.updated += 1;
                self.new_items += new_items;
            }
            SyncOutcome::NoUpdate { .. } => self.unchanged += 1,
            SyncOutcome::Failed { .. } => self.failed += 1,
        }
    }
}

pub struct FeedEngine {
    db: Database,
    syncer: FeedSyncer,
    icons: IconResolver,
}

impl FeedEngine {
    pub fn new(
        db: Database,
        client: reqwest::Client,
        sync: SyncSettings,
        icons: IconSettings,
    ) -> Self {
        Self {
            syncer: FeedSyncer::new(db.clone(), client.clone(), sync),
            icons: IconResolver::new(db.clone(), client, icons),
            db,
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Start tracking `url` and return its feed.
    ///
    /// An already tracked URL is returned as is, without a sync. A new feed
    /// gets a forced first sync and an icon lookup for its domain; if that
    /// first fetch fails the row is kept for later passes and the caller gets
    /// [`SyncError::Unreachable`].
    pub async fn add_feed(&self, url: &str) -> Result<Feed, SyncError> {
        self.add_feed_at(url, util::now_ms()).await
    }

    pub async fn add_feed_at(&self, url: &str, now: i64) -> Result<Feed, SyncError> {
        let url = url.trim();
        util::validate_feed_url(url, self.syncer.settings().allow_private_hosts)?;

        if let Some(existing) = self.db.get_feed_by_url(url).await? {
            tracing::debug!(feed_id = existing.id, url = %url, "Feed already tracked");
            return Ok(existing);
        }

        let feed = self.syncer.ensure_feed(url).await?;
        tracing::info!(feed_id = feed.id, url = %url, "Feed added");

        if let SyncOutcome::Failed { error, .. } =
            self.syncer.sync_at(&FeedRef::Id(feed.id), true, now).await?
        {
            return Err(SyncError::Unreachable {
                url: url.to_string(),
                source: error,
            });
        }

        let mut pass = IconPass::new();
        if let Err(e) = self
            .icons
            .refresh_domain(&feed.domain, false, &mut pass)
            .await
        {
            tracing::warn!(domain = %feed.domain, error = %e, "Icon refresh failed");
        }

        self.db
            .get_feed_by_id(feed.id)
            .await?
            .ok_or(SyncError::FeedNotFound(feed.id))
    }

    pub async fn sync_feed(&self, feed: &FeedRef, force: bool) -> Result<SyncOutcome, SyncError> {
        self.syncer.sync(feed, force).await
    }

    pub async fn sync_feed_at(
        &self,
        feed: &FeedRef,
        force: bool,
        now: i64,
    ) -> Result<SyncOutcome, SyncError> {
        self.syncer.sync_at(feed, force, now).await
    }

    /// One sequential pass over every feed, each synced as of the moment its
    /// turn comes up.
    pub async fn sync_all_feeds(&self, force: bool) -> Result<FeedPassReport, DatabaseError> {
        self.sync_pass(force, util::now_ms).await
    }

    /// Like [`sync_all_feeds`](Self::sync_all_feeds), with every feed synced
    /// as of the same `now`.
    pub async fn sync_all_feeds_at(
        &self,
        force: bool,
        now: i64,
    ) -> Result<FeedPassReport, DatabaseError> {
        self.sync_pass(force, || now).await
    }

    /// A feed whose sync errors is logged and counted; the pass continues.
    /// Only failing to list the feeds aborts it.
    async fn sync_pass(
        &self,
        force: bool,
        clock: impl Fn() -> i64,
    ) -> Result<FeedPassReport, DatabaseError> {
        let ids = self.db.list_feed_ids().await?;
        let mut report = FeedPassReport::default();

        for id in ids {
            match self.syncer.sync_at(&FeedRef::Id(id), force, clock()).await {
                Ok(outcome) => report.record(&outcome),
                Err(e) => {
                    tracing::error!(feed_id = id, error = %e, "Feed sync failed");
                    report.errors += 1;
                }
            }
        }

        Ok(report)
    }

    /// Stop tracking a feed and drop its items. False if it was not tracked.
    pub async fn delete_feed(&self, feed: &FeedRef) -> Result<bool, DatabaseError> {
        match self.db.get_feed(feed).await? {
            Some(found) => self.db.delete_feed(found.id).await,
            None => Ok(false),
        }
    }

    pub async fn get_icon(&self, domain: &str) -> Vec<u8> {
        self.icons.resolve(domain).await
    }

    pub async fn refresh_icons(&self, force: bool) -> Result<IconPassReport, DatabaseError> {
        self.icons.refresh_all(force).await
    }

    pub async fn get_feeds(&self) -> Result<Vec<FeedSummary>, DatabaseError> {
        self.db.get_feeds().await
    }

    pub async fn get_items(&self, filter: &ItemFilter) -> Result<Vec<FeedItem>, DatabaseError> {
        self.db.get_items(filter).await
    }
}
