use sqlx::QueryBuilder;

use super::schema::Database;
use super::types::{DatabaseError, FeedItem, ItemFilter, NewFeedItem};

/// Maximum number of items returned by a single listing (OOM protection)
const MAX_ITEMS: i64 = 2000;

impl Database {
    // ========================================================================
    // Item Operations
    // ========================================================================

    /// Find an item by URL anywhere in the store, regardless of owning feed
    pub async fn get_item_by_url(&self, url: &str) -> Result<Option<FeedItem>, DatabaseError> {
        let item = sqlx::query_as::<_, FeedItem>(
            r#"
            SELECT id, feed_id, title, url, content, published, last_seen
            FROM items
            WHERE url = ?
        "#,
        )
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;
        Ok(item)
    }

    /// Insert a new item, returning its row id.
    ///
    /// Returns `None` if an item with the same URL already exists; the stored
    /// row is left as it was.
    pub async fn insert_item(&self, item: &NewFeedItem) -> Result<Option<i64>, DatabaseError> {
        let row: Option<(i64,)> = sqlx::query_as(
            r#"
            INSERT INTO items (feed_id, title, url, content, published, last_seen)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(url) DO NOTHING
            RETURNING id
        "#,
        )
        .bind(item.feed_id)
        .bind(&item.title)
        .bind(&item.url)
        .bind(&item.content)
        .bind(item.published)
        .bind(item.last_seen)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(id,)| id))
    }

    /// Record that an already stored item reappeared in a fetch
    pub async fn touch_item_last_seen(&self, item_id: i64, ts: i64) -> Result<(), DatabaseError> {
        sqlx::query("UPDATE items SET last_seen = ? WHERE id = ?")
            .bind(ts)
            .bind(item_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// List items matching `filter`, oldest first.
    ///
    /// Capped at MAX_ITEMS rows even when no limit is given.
    pub async fn get_items(&self, filter: &ItemFilter) -> Result<Vec<FeedItem>, DatabaseError> {
        let mut builder: QueryBuilder<sqlx::Sqlite> = QueryBuilder::new(
            "SELECT id, feed_id, title, url, content, published, last_seen FROM items WHERE 1 = 1",
        );

        if let Some(feed_id) = filter.feed {
            builder.push(" AND feed_id = ");
            builder.push_bind(feed_id);
        }
        if let Some(min_date) = filter.min_date {
            builder.push(" AND published >= ");
            builder.push_bind(min_date);
        }

        let limit = filter
            .limit
            .filter(|l| *l > 0)
            .unwrap_or(MAX_ITEMS)
            .min(MAX_ITEMS);
        builder.push(" ORDER BY published, id LIMIT ");
        builder.push_bind(limit);

        if let Some(offset) = filter.offset.filter(|o| *o > 0) {
            builder.push(" OFFSET ");
            builder.push_bind(offset);
        }

        let items = builder
            .build_query_as::<FeedItem>()
            .fetch_all(&self.pool)
            .await?;
        Ok(items)
    }
}
