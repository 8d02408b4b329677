//! 通知投递日志数据仓库

use crate::db::PostgresPool;
use crate::errors::AppError;
use crate::models::DeliveryRecord;
use sqlx::PgConnection;

/// 投递日志数据仓库
#[derive(Clone)]
pub struct DeliveryRepository {
    pool: PostgresPool,
}

impl DeliveryRepository {
    pub fn new(pool: PostgresPool) -> Self {
        Self { pool }
    }

    /// 插入投递记录（可在事务中调用）
    pub async fn insert(conn: &mut PgConnection, record: &DeliveryRecord) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO delivery_log (
                id, alert_event_id, channel_name, channel_type, target, success,
                response_code, error_message, is_test, attempted_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(record.id)
        .bind(record.alert_event_id)
        .bind(&record.channel_name)
        .bind(record.channel_type)
        .bind(&record.target)
        .bind(record.success)
        .bind(record.response_code)
        .bind(&record.error_message)
        .bind(record.is_test)
        .bind(record.attempted_at)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// 获取最近 N 条投递记录
    pub async fn recent(&self, limit: i64) -> Result<Vec<DeliveryRecord>, AppError> {
        let records = sqlx::query_as::<_, DeliveryRecord>(
            "SELECT * FROM delivery_log ORDER BY attempted_at DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(self.pool.pool())
        .await?;

        Ok(records)
    }
}
