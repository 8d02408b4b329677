//! 历史存储抽象
//!
//! 监控循环只通过 [`HistoryStore`] 写入，读 API 只通过它读取。
//! 写入是只追加的，唯一的例外是外部确认操作把预警事件标记为已解决。

use crate::errors::AppError;
use crate::models::{AlertEvent, DeliveryRecord, StatusSnapshot};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// 单个监控周期需要持久化的全部记录
#[derive(Debug, Clone, Default)]
pub struct CycleRecord {
    /// 轮询失败的周期没有快照
    pub snapshot: Option<StatusSnapshot>,
    pub events: Vec<AlertEvent>,
    pub deliveries: Vec<DeliveryRecord>,
}

impl CycleRecord {
    pub fn is_empty(&self) -> bool {
        self.snapshot.is_none() && self.events.is_empty() && self.deliveries.is_empty()
    }
}

/// 历史存储
#[async_trait::async_trait]
pub trait HistoryStore: Send + Sync {
    /// 追加状态快照
    async fn append_status(&self, snapshot: &StatusSnapshot) -> Result<(), AppError>;

    /// 追加预警事件
    async fn append_alerts(&self, events: &[AlertEvent]) -> Result<(), AppError>;

    /// 追加投递记录
    async fn append_deliveries(&self, deliveries: &[DeliveryRecord]) -> Result<(), AppError>;

    /// 持久化一个周期的记录
    ///
    /// 默认实现按快照、事件、投递的顺序依次写入；支持事务的实现应保证原子性。
    async fn record_cycle(&self, cycle: &CycleRecord) -> Result<(), AppError> {
        if let Some(snapshot) = &cycle.snapshot {
            self.append_status(snapshot).await?;
        }
        self.append_alerts(&cycle.events).await?;
        self.append_deliveries(&cycle.deliveries).await
    }

    /// 最新的状态快照
    async fn latest_status(&self) -> Result<Option<StatusSnapshot>, AppError>;

    /// 最近 N 条状态快照，按时间倒序
    async fn recent_status(&self, limit: i64) -> Result<Vec<StatusSnapshot>, AppError>;

    /// 最近 N 条预警事件，按时间倒序
    async fn recent_alerts(&self, limit: i64) -> Result<Vec<AlertEvent>, AppError>;

    /// 最近 N 条投递记录，按时间倒序
    async fn recent_deliveries(&self, limit: i64) -> Result<Vec<DeliveryRecord>, AppError>;

    /// 确认（解决）预警事件，重复确认保留首次解决时间
    async fn resolve_alert(&self, id: Uuid, at: DateTime<Utc>) -> Result<AlertEvent, AppError>;

    /// 删除早于 cutoff 的状态历史，返回删除条数
    async fn purge_status_before(&self, cutoff: DateTime<Utc>) -> Result<u64, AppError>;

    /// 存储健康检查
    async fn health_check(&self) -> Result<(), AppError>;
}
