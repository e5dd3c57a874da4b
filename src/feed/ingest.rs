use crate::storage::{Database, DatabaseError, NewFeedItem};

use super::parser::ParsedItem;
use super::sanitize::Sanitizer;

/// Result of ingesting one batch of candidate items
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// New rows written
    pub inserted: usize,
    /// Items already in the store whose `last_seen` was advanced
    pub touched: usize,
    /// Candidates dropped for having no link
    pub skipped: usize,
    /// Greatest published time among inserted items. Items dated at or
    /// before the epoch are stored but never set this.
    pub max_new_item_date: Option<i64>,
}

impl IngestReport {
    /// True when the batch moved the feed's content timestamp forward
    pub fn has_new_items(&self) -> bool {
        self.max_new_item_date.is_some()
    }
}

/// Deduplicates, sanitizes and persists parsed items.
///
/// The dedup key is the item URL across the whole store, so an entry that
/// several feeds syndicate is kept once, under the feed that saw it first.
pub struct ItemIngestor {
    db: Database,
    sanitizer: Sanitizer,
}

impl ItemIngestor {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            sanitizer: Sanitizer::new(),
        }
    }

    /// Ingest `items` for `feed_id` in source order.
    ///
    /// Store errors abort the batch; items processed before the error stay
    /// written.
    pub async fn ingest(
        &self,
        feed_id: i64,
        items: &[ParsedItem],
        now: i64,
    ) -> Result<IngestReport, DatabaseError> {
        let mut report = IngestReport::default();

        for item in items {
            let Some(url) = item.link.as_deref() else {
                tracing::debug!(
                    feed_id,
                    title = item.title.as_deref().unwrap_or(""),
                    "Skipping item without link"
                );
                report.skipped += 1;
                continue;
            };

            if self.touch_existing(url, now).await? {
                report.touched += 1;
                continue;
            }

            let published = item.published.unwrap_or(now);
            let new_item = NewFeedItem {
                feed_id,
                title: item.title.clone().unwrap_or_default(),
                url: url.to_string(),
                content: self
                    .sanitizer
                    .clean(item.content.as_deref().unwrap_or_default()),
                published,
                last_seen: now,
            };
            let Some(item_id) = self.db.insert_item(&new_item).await? else {
                // Another writer stored the same URL since the lookup
                if self.touch_existing(url, now).await? {
                    report.touched += 1;
                }
                continue;
            };
            tracing::trace!(feed_id, item_id, url = %url, "Inserted item");

            report.inserted += 1;
            if published > 0 {
                report.max_new_item_date = Some(
                    report
                        .max_new_item_date
                        .map_or(published, |max| max.max(published)),
                );
            }
        }

        Ok(report)
    }

    /// Advance `last_seen` of the stored item with this URL, if any
    async fn touch_existing(&self, url: &str, now: i64) -> Result<bool, DatabaseError> {
        match self.db.get_item_by_url(url).await? {
            Some(existing) => {
                self.db.touch_item_last_seen(existing.id, now).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
