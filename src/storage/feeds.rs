use super::schema::Database;
use super::types::{DatabaseError, Feed, FeedRef, FeedSummary, NewFeed};

impl Database {
    // ========================================================================
    // Feed Operations
    // ========================================================================

    /// Ids of every known feed, oldest first
    pub async fn list_feed_ids(&self) -> Result<Vec<i64>, DatabaseError> {
        let rows: Vec<(i64,)> = sqlx::query_as("SELECT id FROM feeds ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Domain of every feed in id order. Domains shared by several feeds
    /// appear once per feed.
    pub async fn list_feed_domains(&self) -> Result<Vec<String>, DatabaseError> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT domain FROM feeds ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|(domain,)| domain).collect())
    }

    /// Look up a feed by id or by URL
    pub async fn get_feed(&self, key: &FeedRef) -> Result<Option<Feed>, DatabaseError> {
        match key {
            FeedRef::Id(id) => self.get_feed_by_id(*id).await,
            FeedRef::Url(url) => self.get_feed_by_url(url).await,
        }
    }

    pub async fn get_feed_by_id(&self, feed_id: i64) -> Result<Option<Feed>, DatabaseError> {
        let feed = sqlx::query_as::<_, Feed>(
            r#"
            SELECT id, url, title, domain, last_check, last_update, poll_interval
            FROM feeds
            WHERE id = ?
        "#,
        )
        .bind(feed_id)
        .fetch_optional(&self.pool)
        .await?;

        if feed.is_none() {
            tracing::trace!(feed_id = feed_id, "No feed for id");
        }
        Ok(feed)
    }

    pub async fn get_feed_by_url(&self, url: &str) -> Result<Option<Feed>, DatabaseError> {
        let feed = sqlx::query_as::<_, Feed>(
            r#"
            SELECT id, url, title, domain, last_check, last_update, poll_interval
            FROM feeds
            WHERE url = ?
        "#,
        )
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;
        Ok(feed)
    }

    /// Insert a feed, or return the id of the existing row with the same URL.
    ///
    /// The conflict clause turns a duplicate insert into a no-op update so
    /// `RETURNING` still yields the surviving row's id. Nothing but the URL is
    /// touched on conflict; an existing feed keeps its schedule and title.
    pub async fn insert_feed(&self, feed: &NewFeed) -> Result<i64, DatabaseError> {
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO feeds (url, title, domain, last_check, last_update, poll_interval)
            VALUES (?, ?, ?, 0, 0, ?)
            ON CONFLICT(url) DO UPDATE SET url = excluded.url
            RETURNING id
        "#,
        )
        .bind(&feed.url)
        .bind(&feed.title)
        .bind(&feed.domain)
        .bind(feed.poll_interval)
        .fetch_one(&self.pool)
        .await?;

        tracing::trace!(feed_id = id, url = %feed.url, "Feed row ensured");
        Ok(id)
    }

    /// Persist every mutable column of an existing feed
    pub async fn update_feed(&self, feed: &Feed) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            UPDATE feeds
            SET title = ?, domain = ?, last_check = ?, last_update = ?, poll_interval = ?
            WHERE id = ?
        "#,
        )
        .bind(&feed.title)
        .bind(&feed.domain)
        .bind(feed.last_check)
        .bind(feed.last_update)
        .bind(feed.poll_interval)
        .bind(feed.id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Delete a feed and all of its items. Returns false if no such feed.
    pub async fn delete_feed(&self, feed_id: i64) -> Result<bool, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        // Explicit delete keeps the cascade independent of the foreign_keys pragma
        let items = sqlx::query("DELETE FROM items WHERE feed_id = ?")
            .bind(feed_id)
            .execute(&mut *tx)
            .await?;
        let feeds = sqlx::query("DELETE FROM feeds WHERE id = ?")
            .bind(feed_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        let removed = feeds.rows_affected() > 0;
        if removed {
            tracing::debug!(
                feed_id = feed_id,
                items = items.rows_affected(),
                "Feed deleted"
            );
        }
        Ok(removed)
    }

    /// All feeds with their item counts, most recently updated first
    pub async fn get_feeds(&self) -> Result<Vec<FeedSummary>, DatabaseError> {
        let feeds = sqlx::query_as::<_, FeedSummary>(
            r#"
            SELECT
                f.id, f.url, f.title, f.domain, f.last_check, f.last_update, f.poll_interval,
                COUNT(i.id) AS total
            FROM feeds f
            LEFT JOIN items i ON i.feed_id = f.id
            GROUP BY f.id
            ORDER BY f.last_update DESC, f.id
        "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(feeds)
    }
}
