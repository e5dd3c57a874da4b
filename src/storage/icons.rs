use super::schema::Database;
use super::types::{DatabaseError, Icon};

impl Database {
    // ========================================================================
    // Icon Operations
    // ========================================================================

    pub async fn get_icon(&self, domain: &str) -> Result<Option<Icon>, DatabaseError> {
        let icon = sqlx::query_as::<_, Icon>("SELECT id, domain, data FROM icons WHERE domain = ?")
            .bind(domain)
            .fetch_optional(&self.pool)
            .await?;
        Ok(icon)
    }

    /// Store icon bytes for a domain, replacing any previous image.
    ///
    /// The row id survives a replace, so at most one row exists per domain.
    pub async fn upsert_icon(&self, domain: &str, data: &[u8]) -> Result<i64, DatabaseError> {
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO icons (domain, data)
            VALUES (?, ?)
            ON CONFLICT(domain) DO UPDATE SET data = excluded.data
            RETURNING id
        "#,
        )
        .bind(domain)
        .bind(data)
        .fetch_one(&self.pool)
        .await?;

        tracing::trace!(icon_id = id, domain = %domain, bytes = data.len(), "Icon stored");
        Ok(id)
    }

    pub async fn delete_icon(&self, icon_id: i64) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM icons WHERE id = ?")
            .bind(icon_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
