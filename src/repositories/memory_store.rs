//! 内存历史存储
//!
//! 未配置 `DATABASE_URL` 时使用，每类记录只保留最近 `capacity` 条。

use super::{CycleRecord, HistoryStore};
use crate::errors::AppError;
use crate::models::{AlertEvent, DeliveryRecord, StatusSnapshot};
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    status: VecDeque<StatusSnapshot>,
    alerts: VecDeque<AlertEvent>,
    deliveries: VecDeque<DeliveryRecord>,
}

/// 有界内存历史存储
pub struct InMemoryHistoryStore {
    capacity: usize,
    tables: RwLock<Tables>,
}

impl InMemoryHistoryStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            tables: RwLock::new(Tables::default()),
        }
    }
}

fn push_bounded<T>(queue: &mut VecDeque<T>, item: T, capacity: usize) {
    if queue.len() == capacity {
        queue.pop_front();
    }
    queue.push_back(item);
}

fn newest<T: Clone>(queue: &VecDeque<T>, limit: i64) -> Vec<T> {
    let limit = usize::try_from(limit).unwrap_or(0);
    queue.iter().rev().take(limit).cloned().collect()
}

#[async_trait::async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn append_status(&self, snapshot: &StatusSnapshot) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        push_bounded(&mut tables.status, snapshot.clone(), self.capacity);
        Ok(())
    }

    async fn append_alerts(&self, events: &[AlertEvent]) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        for event in events {
            push_bounded(&mut tables.alerts, event.clone(), self.capacity);
        }
        Ok(())
    }

    async fn append_deliveries(&self, deliveries: &[DeliveryRecord]) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        for record in deliveries {
            push_bounded(&mut tables.deliveries, record.clone(), self.capacity);
        }
        Ok(())
    }

    async fn record_cycle(&self, cycle: &CycleRecord) -> Result<(), AppError> {
        // 同一把写锁内完成，读者看不到半个周期
        let mut tables = self.tables.write().await;
        if let Some(snapshot) = &cycle.snapshot {
            push_bounded(&mut tables.status, snapshot.clone(), self.capacity);
        }
        for event in &cycle.events {
            push_bounded(&mut tables.alerts, event.clone(), self.capacity);
        }
        for record in &cycle.deliveries {
            push_bounded(&mut tables.deliveries, record.clone(), self.capacity);
        }
        Ok(())
    }

    async fn latest_status(&self) -> Result<Option<StatusSnapshot>, AppError> {
        Ok(self.tables.read().await.status.back().cloned())
    }

    async fn recent_status(&self, limit: i64) -> Result<Vec<StatusSnapshot>, AppError> {
        Ok(newest(&self.tables.read().await.status, limit))
    }

    async fn recent_alerts(&self, limit: i64) -> Result<Vec<AlertEvent>, AppError> {
        Ok(newest(&self.tables.read().await.alerts, limit))
    }

    async fn recent_deliveries(&self, limit: i64) -> Result<Vec<DeliveryRecord>, AppError> {
        Ok(newest(&self.tables.read().await.deliveries, limit))
    }

    async fn resolve_alert(&self, id: Uuid, at: DateTime<Utc>) -> Result<AlertEvent, AppError> {
        let mut tables = self.tables.write().await;
        let event = tables
            .alerts
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| AppError::NotFound(format!("预警事件不存在: {}", id)))?;

        event.resolved = true;
        if event.resolved_at.is_none() {
            event.resolved_at = Some(at);
        }

        Ok(event.clone())
    }

    async fn purge_status_before(&self, cutoff: DateTime<Utc>) -> Result<u64, AppError> {
        let mut tables = self.tables.write().await;
        let before = tables.status.len();
        tables.status.retain(|s| s.timestamp >= cutoff);
        Ok((before - tables.status.len()) as u64)
    }

    async fn health_check(&self) -> Result<(), AppError> {
        Ok(())
    }
}
