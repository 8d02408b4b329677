//! 读 API 使用的查询服务

use crate::errors::AppError;
use crate::models::{
    AlertEvent, DeliveryRecord, LiveStatus, StatusSnapshot, TestNotificationResult,
};
use crate::repositories::HistoryStore;
use crate::services::Dispatcher;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// 状态查询服务
pub struct StatusService {
    live: Arc<RwLock<LiveStatus>>,
    store: Arc<dyn HistoryStore>,
    dispatcher: Arc<Dispatcher>,
}

impl StatusService {
    pub fn new(
        live: Arc<RwLock<LiveStatus>>,
        store: Arc<dyn HistoryStore>,
        dispatcher: Arc<Dispatcher>,
    ) -> Self {
        Self {
            live,
            store,
            dispatcher,
        }
    }

    pub fn store(&self) -> &Arc<dyn HistoryStore> {
        &self.store
    }

    /// 当前状态；本进程尚无快照时回退到最近一次持久化的快照
    pub async fn current_status(&self) -> Result<LiveStatus, AppError> {
        let mut status = self.live.read().await.clone();
        if status.snapshot.is_none() {
            status.snapshot = self.store.latest_status().await?;
        }
        Ok(status)
    }

    /// 监控循环最近一次轮询是否成功
    pub async fn is_connected(&self) -> bool {
        self.live.read().await.connected
    }

    pub async fn history(&self, limit: i64) -> Result<Vec<StatusSnapshot>, AppError> {
        self.store.recent_status(limit).await
    }

    pub async fn alerts(&self, limit: i64) -> Result<Vec<AlertEvent>, AppError> {
        self.store.recent_alerts(limit).await
    }

    pub async fn deliveries(&self, limit: i64) -> Result<Vec<DeliveryRecord>, AppError> {
        self.store.recent_deliveries(limit).await
    }

    /// 确认预警事件，重复确认保留首次确认时间
    pub async fn acknowledge(&self, id: Uuid) -> Result<AlertEvent, AppError> {
        let event = self.store.resolve_alert(id, Utc::now()).await?;
        tracing::info!(alert_id = %id, kind = %event.rule_kind, "预警事件已确认");
        Ok(event)
    }

    /// 发送测试通知并记录投递结果
    pub async fn test_notification(&self, selector: &str) -> Result<TestNotificationResult, AppError> {
        let result = self.dispatcher.send_test(selector, Utc::now()).await?;

        if let Err(e) = self.store.append_deliveries(&result.deliveries).await {
            tracing::error!(error = %e, selector, "测试通知投递记录保存失败");
        }

        tracing::info!(
            selector,
            success = result.success,
            channels = result.deliveries.len(),
            "测试通知已发送"
        );

        Ok(result)
    }
}
