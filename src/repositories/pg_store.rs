//! PostgreSQL 历史存储

use super::{
    AlertRepository, CycleRecord, DeliveryRepository, HistoryStore, StatusRepository,
};
use crate::db::PostgresPool;
use crate::errors::AppError;
use crate::models::{AlertEvent, DeliveryRecord, StatusSnapshot};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// 基于 PostgreSQL 的历史存储，一个周期的写入在同一事务内完成
#[derive(Clone)]
pub struct PgHistoryStore {
    pool: PostgresPool,
    status_repo: StatusRepository,
    alert_repo: AlertRepository,
    delivery_repo: DeliveryRepository,
}

impl PgHistoryStore {
    pub fn new(pool: PostgresPool) -> Self {
        Self {
            status_repo: StatusRepository::new(pool.clone()),
            alert_repo: AlertRepository::new(pool.clone()),
            delivery_repo: DeliveryRepository::new(pool.clone()),
            pool,
        }
    }
}

#[async_trait::async_trait]
impl HistoryStore for PgHistoryStore {
    async fn append_status(&self, snapshot: &StatusSnapshot) -> Result<(), AppError> {
        let mut conn = self.pool.pool().acquire().await?;
        StatusRepository::insert(&mut conn, snapshot).await
    }

    async fn append_alerts(&self, events: &[AlertEvent]) -> Result<(), AppError> {
        let mut tx = self.pool.pool().begin().await?;
        for event in events {
            AlertRepository::insert(&mut tx, event).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn append_deliveries(&self, deliveries: &[DeliveryRecord]) -> Result<(), AppError> {
        let mut tx = self.pool.pool().begin().await?;
        for record in deliveries {
            DeliveryRepository::insert(&mut tx, record).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn record_cycle(&self, cycle: &CycleRecord) -> Result<(), AppError> {
        let mut tx = self.pool.pool().begin().await?;

        if let Some(snapshot) = &cycle.snapshot {
            StatusRepository::insert(&mut tx, snapshot).await?;
        }
        for event in &cycle.events {
            AlertRepository::insert(&mut tx, event).await?;
        }
        for record in &cycle.deliveries {
            DeliveryRepository::insert(&mut tx, record).await?;
        }

        tx.commit().await?;

        tracing::debug!(
            snapshot = cycle.snapshot.is_some(),
            events = cycle.events.len(),
            deliveries = cycle.deliveries.len(),
            "周期记录已写入"
        );

        Ok(())
    }

    async fn latest_status(&self) -> Result<Option<StatusSnapshot>, AppError> {
        self.status_repo.latest().await
    }

    async fn recent_status(&self, limit: i64) -> Result<Vec<StatusSnapshot>, AppError> {
        self.status_repo.recent(limit).await
    }

    async fn recent_alerts(&self, limit: i64) -> Result<Vec<AlertEvent>, AppError> {
        self.alert_repo.recent(limit).await
    }

    async fn recent_deliveries(&self, limit: i64) -> Result<Vec<DeliveryRecord>, AppError> {
        self.delivery_repo.recent(limit).await
    }

    async fn resolve_alert(&self, id: Uuid, at: DateTime<Utc>) -> Result<AlertEvent, AppError> {
        self.alert_repo.resolve(id, at).await
    }

    async fn purge_status_before(&self, cutoff: DateTime<Utc>) -> Result<u64, AppError> {
        self.status_repo.delete_before(cutoff).await
    }

    async fn health_check(&self) -> Result<(), AppError> {
        self.pool.health_check().await
    }
}
