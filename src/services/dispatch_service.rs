//! 通知分发服务
//!
//! 将预警事件并发投递到目标渠道，每个渠道独立超时，
//! 单个渠道失败不影响其他渠道。每个目标渠道恰好产生一条投递记录。

use crate::errors::{AppError, NotifyError};
use crate::models::{
    ChannelKind, ChannelType, DeliveryRecord, FiredEvent, Notification, NotificationChannel,
    SendOutcome, StatusSnapshot, TestNotificationResult,
};
use crate::services::{EmailService, SmsService, WebhookService};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::time::Duration;
use uuid::Uuid;

/// 通知分发器
#[derive(Clone)]
pub struct Dispatcher {
    channels: Vec<NotificationChannel>,
    webhook: WebhookService,
    email: EmailService,
    sms: SmsService,
}

impl Dispatcher {
    pub fn new(
        channels: Vec<NotificationChannel>,
        webhook: WebhookService,
        email: EmailService,
        sms: SmsService,
    ) -> Self {
        Self {
            channels,
            webhook,
            email,
            sms,
        }
    }

    /// 使用默认的 HTTP/SMTP 实现
    pub fn from_channels(channels: Vec<NotificationChannel>) -> Self {
        Self::new(
            channels,
            WebhookService::default(),
            EmailService::default(),
            SmsService::default(),
        )
    }

    /// 事件的目标渠道：已启用，且在事件指定的列表中（列表为空表示全部）
    fn targets<'a>(&'a self, fired: &FiredEvent) -> Vec<&'a NotificationChannel> {
        self.channels
            .iter()
            .filter(|c| c.enabled)
            .filter(|c| fired.channels.is_empty() || fired.channels.iter().any(|n| n == &c.name))
            .collect()
    }

    /// 分发一条预警事件
    pub async fn dispatch(
        &self,
        fired: &FiredEvent,
        snapshot: Option<&StatusSnapshot>,
    ) -> Vec<DeliveryRecord> {
        let targets = self.targets(fired);
        if targets.is_empty() {
            tracing::warn!(
                rule = %fired.event.rule_name,
                kind = %fired.event.rule_kind,
                "没有可用的通知渠道，事件仅记录"
            );
            return Vec::new();
        }

        let notification = Notification::for_event(&fired.event, snapshot);
        let deliveries = join_all(
            targets
                .into_iter()
                .map(|channel| self.deliver(channel, &notification, Some(fired.event.id), false)),
        )
        .await;

        let failed = deliveries.iter().filter(|d| !d.success).count();
        tracing::info!(
            alert_id = %fired.event.id,
            kind = %fired.event.rule_kind,
            level = ?fired.event.level,
            total = deliveries.len(),
            failed = failed,
            "预警通知分发完成"
        );

        deliveries
    }

    /// 发送测试通知
    ///
    /// 先按名称匹配（包括已禁用的渠道），再按类型匹配已启用的渠道。
    pub async fn send_test(
        &self,
        selector: &str,
        now: DateTime<Utc>,
    ) -> Result<TestNotificationResult, AppError> {
        let targets: Vec<&NotificationChannel> =
            match self.channels.iter().find(|c| c.name == selector) {
                Some(channel) => vec![channel],
                None => match selector.parse::<ChannelType>() {
                    Ok(channel_type) => self
                        .channels
                        .iter()
                        .filter(|c| c.enabled && c.channel_type() == channel_type)
                        .collect(),
                    Err(_) => Vec::new(),
                },
            };

        if targets.is_empty() {
            return Err(AppError::NotFound(format!("通知渠道不存在: {}", selector)));
        }

        let deliveries = join_all(targets.into_iter().map(|channel| {
            let notification = Notification::test(&channel.name, now);
            async move { self.deliver(channel, &notification, None, true).await }
        }))
        .await;

        let failed: Vec<&DeliveryRecord> = deliveries.iter().filter(|d| !d.success).collect();
        let message = if failed.is_empty() {
            format!("测试通知已发送到 {} 个渠道", deliveries.len())
        } else {
            let details: Vec<String> = failed
                .iter()
                .map(|d| {
                    format!(
                        "{}: {}",
                        d.channel_name,
                        d.error_message.as_deref().unwrap_or("未知错误")
                    )
                })
                .collect();
            format!(
                "{}/{} 个渠道发送失败: {}",
                failed.len(),
                deliveries.len(),
                details.join("; ")
            )
        };

        Ok(TestNotificationResult {
            success: failed.is_empty(),
            message,
            deliveries,
        })
    }

    async fn deliver(
        &self,
        channel: &NotificationChannel,
        notification: &Notification,
        alert_event_id: Option<Uuid>,
        is_test: bool,
    ) -> DeliveryRecord {
        let timeout_secs = channel.kind.delivery_timeout_seconds();
        let result = match tokio::time::timeout(
            Duration::from_secs(timeout_secs),
            self.send(&channel.kind, notification),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(NotifyError::Timeout(timeout_secs)),
        };

        let (success, response_code, error_message) = match result {
            Ok(outcome) => (true, outcome.response_code, None),
            Err(e) => {
                tracing::warn!(
                    channel = %channel.name,
                    channel_type = %channel.channel_type(),
                    error = %e,
                    "通知发送失败"
                );
                (false, e.response_code(), Some(e.to_string()))
            }
        };

        DeliveryRecord {
            id: Uuid::new_v4(),
            alert_event_id,
            channel_name: channel.name.clone(),
            channel_type: channel.channel_type(),
            target: channel.kind.target(),
            success,
            response_code,
            error_message,
            is_test,
            attempted_at: Utc::now(),
        }
    }

    async fn send(
        &self,
        kind: &ChannelKind,
        notification: &Notification,
    ) -> Result<SendOutcome, NotifyError> {
        match kind {
            ChannelKind::Webhook(cfg) => self.webhook.send(cfg, notification).await,
            ChannelKind::Email(cfg) => self.email.send(cfg, notification).await,
            ChannelKind::Sms(cfg) => self.sms.send(cfg, notification).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AlertEvent, AlertLevel, RuleKind, WebhookConfig};
    use std::collections::HashMap;

    fn webhook(name: &str, enabled: bool) -> NotificationChannel {
        NotificationChannel {
            name: name.to_string(),
            enabled,
            kind: ChannelKind::Webhook(WebhookConfig {
                url: "http://127.0.0.1:1/hook".to_string(),
                method: "POST".to_string(),
                headers: HashMap::new(),
                timeout_seconds: 2,
            }),
        }
    }

    fn fired(channels: Vec<String>) -> FiredEvent {
        FiredEvent {
            event: AlertEvent::new(
                "市电",
                RuleKind::LineStatus,
                AlertLevel::Critical,
                "UPS 切换到电池供电".to_string(),
                None,
                None,
                Utc::now(),
            ),
            channels,
        }
    }

    #[test]
    fn test_targets_skip_disabled_and_filter_by_name() {
        let dispatcher = Dispatcher::from_channels(vec![
            webhook("a", true),
            webhook("b", false),
            webhook("c", true),
        ]);

        let all: Vec<&str> = dispatcher
            .targets(&fired(vec![]))
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(all, vec!["a", "c"]);

        let named: Vec<&str> = dispatcher
            .targets(&fired(vec!["c".to_string(), "b".to_string()]))
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(named, vec!["c"]);
    }

    #[tokio::test]
    async fn test_dispatch_without_targets_yields_no_records() {
        let dispatcher = Dispatcher::from_channels(vec![webhook("off", false)]);
        assert!(dispatcher.dispatch(&fired(vec![]), None).await.is_empty());
    }

    #[tokio::test]
    async fn test_send_test_unknown_selector() {
        let dispatcher = Dispatcher::from_channels(vec![webhook("a", true)]);
        let err = dispatcher.send_test("nope", Utc::now()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        // 按类型匹配时跳过已禁用渠道
        let dispatcher = Dispatcher::from_channels(vec![webhook("off", false)]);
        let err = dispatcher.send_test("webhook", Utc::now()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
