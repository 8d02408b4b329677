//! 状态历史数据仓库

use crate::db::PostgresPool;
use crate::errors::AppError;
use crate::models::{StatusHistoryRow, StatusSnapshot};
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgConnection;

/// 状态历史数据仓库
#[derive(Clone)]
pub struct StatusRepository {
    pool: PostgresPool,
}

impl StatusRepository {
    pub fn new(pool: PostgresPool) -> Self {
        Self { pool }
    }

    /// 插入状态快照（可在事务中调用）
    pub async fn insert(conn: &mut PgConnection, snapshot: &StatusSnapshot) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO status_history (
                recorded_at, line_state, ups_status, charge_pct, runtime_s, load_pct,
                input_v, output_v, battery_v, temperature_c, bad_packs, extra
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(snapshot.timestamp)
        .bind(snapshot.line_state)
        .bind(&snapshot.ups_status)
        .bind(snapshot.charge_pct)
        .bind(snapshot.runtime_s.and_then(|v| i64::try_from(v).ok()))
        .bind(snapshot.load_pct)
        .bind(snapshot.input_v)
        .bind(snapshot.output_v)
        .bind(snapshot.battery_v)
        .bind(snapshot.temperature_c)
        .bind(snapshot.bad_packs.and_then(|v| i32::try_from(v).ok()))
        .bind(Json(snapshot.extra.clone()))
        .execute(conn)
        .await?;

        Ok(())
    }

    /// 获取最新快照
    pub async fn latest(&self) -> Result<Option<StatusSnapshot>, AppError> {
        let row = sqlx::query_as::<_, StatusHistoryRow>(
            "SELECT * FROM status_history ORDER BY recorded_at DESC, id DESC LIMIT 1",
        )
        .fetch_optional(self.pool.pool())
        .await?;

        Ok(row.map(StatusSnapshot::from))
    }

    /// 获取最近 N 条快照
    pub async fn recent(&self, limit: i64) -> Result<Vec<StatusSnapshot>, AppError> {
        let rows = sqlx::query_as::<_, StatusHistoryRow>(
            "SELECT * FROM status_history ORDER BY recorded_at DESC, id DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(self.pool.pool())
        .await?;

        Ok(rows.into_iter().map(StatusSnapshot::from).collect())
    }

    /// 删除过期数据
    pub async fn delete_before(&self, cutoff: DateTime<Utc>) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM status_history WHERE recorded_at < $1")
            .bind(cutoff)
            .execute(self.pool.pool())
            .await?;

        Ok(result.rows_affected())
    }
}
