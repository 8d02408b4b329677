//! 预警事件数据仓库

use crate::db::PostgresPool;
use crate::errors::AppError;
use crate::models::AlertEvent;
use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use uuid::Uuid;

/// 预警事件数据仓库
#[derive(Clone)]
pub struct AlertRepository {
    pool: PostgresPool,
}

impl AlertRepository {
    pub fn new(pool: PostgresPool) -> Self {
        Self { pool }
    }

    /// 插入预警事件（可在事务中调用）
    pub async fn insert(conn: &mut PgConnection, event: &AlertEvent) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO alert_events (
                id, rule_name, rule_kind, level, message, value, threshold,
                triggered_at, resolved, resolved_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(event.id)
        .bind(&event.rule_name)
        .bind(event.rule_kind)
        .bind(event.level)
        .bind(&event.message)
        .bind(event.value)
        .bind(event.threshold)
        .bind(event.triggered_at)
        .bind(event.resolved)
        .bind(event.resolved_at)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// 获取最近 N 条预警事件
    pub async fn recent(&self, limit: i64) -> Result<Vec<AlertEvent>, AppError> {
        let events = sqlx::query_as::<_, AlertEvent>(
            "SELECT * FROM alert_events ORDER BY triggered_at DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(self.pool.pool())
        .await?;

        Ok(events)
    }

    /// 标记预警已解决
    pub async fn resolve(&self, id: Uuid, at: DateTime<Utc>) -> Result<AlertEvent, AppError> {
        let event = sqlx::query_as::<_, AlertEvent>(
            r#"
            UPDATE alert_events SET
                resolved = TRUE,
                resolved_at = COALESCE(resolved_at, $2)
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(at)
        .fetch_one(self.pool.pool())
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => AppError::NotFound(format!("预警事件不存在: {}", id)),
            _ => e.into(),
        })?;

        Ok(event)
    }
}
