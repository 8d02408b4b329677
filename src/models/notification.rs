//! 通知模型

use crate::models::{AlertEvent, StatusSnapshot};
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::HashMap;
use uuid::Uuid;
use validator::Validate;

/// 通知渠道类型
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "channel_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ChannelType {
    Webhook,
    Email,
    Sms,
}

impl std::fmt::Display for ChannelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelType::Webhook => write!(f, "webhook"),
            ChannelType::Email => write!(f, "email"),
            ChannelType::Sms => write!(f, "sms"),
        }
    }
}

impl std::str::FromStr for ChannelType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "webhook" => Ok(ChannelType::Webhook),
            "email" => Ok(ChannelType::Email),
            "sms" => Ok(ChannelType::Sms),
            other => Err(format!("未知的通知渠道类型: {}", other)),
        }
    }
}

/// Webhook 渠道参数
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct WebhookConfig {
    #[validate(url(message = "Webhook URL 格式无效"))]
    pub url: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[validate(range(min = 1, max = 120, message = "超时时间应在 1-120 秒之间"))]
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

/// 邮件渠道参数
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct EmailConfig {
    #[validate(length(min = 1, message = "SMTP 服务器地址不能为空"))]
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<SecretString>,
    #[serde(default = "default_true")]
    pub use_tls: bool,
    #[validate(email(message = "发件人地址无效"))]
    pub from_address: String,
    #[validate(length(min = 1, message = "至少需要一个收件人"))]
    pub recipients: Vec<String>,
    #[validate(range(min = 1, max = 120, message = "超时时间应在 1-120 秒之间"))]
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

/// 短信服务商
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SmsProvider {
    Twilio,
}

/// 短信渠道参数
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SmsConfig {
    #[serde(default = "default_provider")]
    pub provider: SmsProvider,
    #[validate(length(min = 1, message = "account_sid 不能为空"))]
    pub account_sid: String,
    pub auth_token: SecretString,
    #[validate(length(min = 1, message = "发送号码不能为空"))]
    pub from_number: String,
    #[validate(length(min = 1, message = "至少需要一个接收号码"))]
    pub recipients: Vec<String>,
    /// 服务商 API 地址，测试时可指向本地
    #[serde(default)]
    pub api_base: Option<String>,
    #[validate(range(min = 1, max = 120, message = "超时时间应在 1-120 秒之间"))]
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

fn default_method() -> String { "POST".to_string() }
fn default_timeout() -> u64 { 10 }
fn default_smtp_port() -> u16 { 587 }
fn default_true() -> bool { true }
fn default_provider() -> SmsProvider { SmsProvider::Twilio }

/// 渠道参数
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ChannelKind {
    Webhook(WebhookConfig),
    Email(EmailConfig),
    Sms(SmsConfig),
}

impl ChannelKind {
    pub fn channel_type(&self) -> ChannelType {
        match self {
            ChannelKind::Webhook(_) => ChannelType::Webhook,
            ChannelKind::Email(_) => ChannelType::Email,
            ChannelKind::Sms(_) => ChannelType::Sms,
        }
    }

    /// 投递目标的可读标识（URL、收件人列表或号码列表）
    pub fn target(&self) -> String {
        match self {
            ChannelKind::Webhook(cfg) => cfg.url.clone(),
            ChannelKind::Email(cfg) => cfg.recipients.join(","),
            ChannelKind::Sms(cfg) => cfg.recipients.join(","),
        }
    }

    /// 整个渠道的投递时限（秒）
    ///
    /// 邮件和短信逐个接收方发送，每个接收方各自受 `timeout_seconds` 限制，
    /// 渠道时限覆盖全部接收方，另留 1 秒余量。
    pub fn delivery_timeout_seconds(&self) -> u64 {
        let per_recipient = |timeout: u64, recipients: usize| {
            timeout
                .saturating_mul(recipients.max(1) as u64)
                .saturating_add(1)
        };

        match self {
            ChannelKind::Webhook(cfg) => cfg.timeout_seconds,
            ChannelKind::Email(cfg) => per_recipient(cfg.timeout_seconds, cfg.recipients.len()),
            ChannelKind::Sms(cfg) => per_recipient(cfg.timeout_seconds, cfg.recipients.len()),
        }
    }
}

/// 通知渠道（来自配置，核心只读）
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationChannel {
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(flatten)]
    pub kind: ChannelKind,
}

impl NotificationChannel {
    pub fn channel_type(&self) -> ChannelType {
        self.kind.channel_type()
    }
}

/// 投递记录（只追加）
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct DeliveryRecord {
    pub id: Uuid,
    /// 测试通知没有关联的预警事件
    pub alert_event_id: Option<Uuid>,
    pub channel_name: String,
    pub channel_type: ChannelType,
    pub target: String,
    pub success: bool,
    pub response_code: Option<i32>,
    pub error_message: Option<String>,
    pub is_test: bool,
    pub attempted_at: DateTime<Utc>,
}

/// 单个渠道发送成功时的结果
#[derive(Debug, Clone, Default)]
pub struct SendOutcome {
    pub response_code: Option<i32>,
}

/// 通知内容类型
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Alert,
    Test,
}

/// 与渠道无关的通知内容
#[derive(Debug, Clone)]
pub struct Notification {
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub event: Option<AlertEvent>,
    pub snapshot: Option<StatusSnapshot>,
}

impl Notification {
    /// 由预警事件构建通知
    pub fn for_event(event: &AlertEvent, snapshot: Option<&StatusSnapshot>) -> Self {
        Self {
            kind: NotificationKind::Alert,
            title: format!("[{:?}] {}", event.level, event.rule_name),
            message: event.message.clone(),
            timestamp: event.triggered_at,
            event: Some(event.clone()),
            snapshot: snapshot.cloned(),
        }
    }

    /// 构建测试通知
    pub fn test(channel_name: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            kind: NotificationKind::Test,
            title: "测试通知".to_string(),
            message: format!("这是来自 upsentry 的测试通知（渠道: {}）", channel_name),
            timestamp,
            event: None,
            snapshot: None,
        }
    }

    /// Webhook JSON 负载
    pub fn webhook_payload(&self) -> serde_json::Value {
        let mut payload = serde_json::json!({
            "type": self.kind,
            "message": self.message,
            "timestamp": self.timestamp,
        });

        if let Some(event) = &self.event {
            payload["event"] = serde_json::json!(event.rule_kind);
            payload["rule"] = serde_json::json!(event.rule_name);
            payload["level"] = serde_json::json!(event.level);
            payload["value"] = serde_json::json!(event.value);
            payload["threshold"] = serde_json::json!(event.threshold);
            payload["alert_id"] = serde_json::json!(event.id);
        }
        if let Some(snapshot) = &self.snapshot {
            payload["status"] = serde_json::json!(snapshot);
        }

        payload
    }

    /// 邮件主题
    pub fn email_subject(&self) -> String {
        format!("【UPS】{}", self.title)
    }

    /// 邮件纯文本正文
    pub fn plain_text(&self) -> String {
        let mut body = vec![self.message.clone(), String::new()];

        if let Some(event) = &self.event {
            body.push(format!("规则: {} ({})", event.rule_name, event.rule_kind));
            if let Some(value) = event.value {
                body.push(format!("测量值: {}", value));
            }
            if let Some(threshold) = event.threshold {
                body.push(format!("阈值: {}", threshold));
            }
        }
        body.push(format!("时间: {}", self.timestamp.to_rfc3339()));

        if let Some(snapshot) = &self.snapshot {
            body.push(String::new());
            body.push("当前 UPS 状态:".to_string());
            body.extend(snapshot.summary_lines());
            for (key, value) in &snapshot.extra {
                body.push(format!("{}: {}", key, value));
            }
        }

        body.join("\n")
    }

    /// 短信正文（事件类型 + 关键指标）
    pub fn sms_text(&self) -> String {
        let mut text = format!("UPS: {}", self.message);
        if let Some(charge) = self.snapshot.as_ref().and_then(|s| s.charge_pct) {
            text.push_str(&format!(" (电量 {:.0}%)", charge));
        }
        text
    }
}

/// 测试通知结果
#[derive(Debug, Clone, Serialize)]
pub struct TestNotificationResult {
    pub success: bool,
    pub message: String,
    pub deliveries: Vec<DeliveryRecord>,
}

/// 投递记录查询参数
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct DeliveryListQuery {
    #[validate(range(min = 1, max = 500, message = "查询数量应在 1-500 之间"))]
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 { 50 }
