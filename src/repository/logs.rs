//! System log repository

use sqlx::{Pool, Postgres};

use crate::{
    error::AppResult,
    models::audit::{AuditEvent, LogEntry},
};

#[derive(Clone)]
pub struct LogsRepository {
    pool: Pool<Postgres>,
}

impl LogsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, event: &AuditEvent) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO log (user_id, type, action, description)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(event.user_id)
        .bind(event.category.as_str())
        .bind(&event.action)
        .bind(&event.description)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Newest entries first
    pub async fn recent(&self, limit: i64) -> AppResult<Vec<LogEntry>> {
        let rows = sqlx::query_as::<_, LogEntry>(
            "SELECT id, date_time, user_id, type, action, description FROM log ORDER BY id DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
