//! 测试辅助工具

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use std::collections::HashMap;
use upsentry::models::{
    AlertRule, ChannelKind, EmailConfig, LineState, NotificationChannel, RuleCondition,
    StatusSnapshot, WebhookConfig,
};

/// 固定的测试时间，加上偏移秒数
pub fn at(offset_secs: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap() + chrono::Duration::seconds(offset_secs)
}

/// 构造快照
pub fn snapshot(line_state: LineState, charge: Option<f64>) -> StatusSnapshot {
    let mut s = StatusSnapshot::empty(at(0), line_state);
    s.ups_status = Some(
        match line_state {
            LineState::OnLine => "OL",
            LineState::OnBattery => "OB DISCHRG",
            LineState::LowBattery => "OB LB",
            LineState::Unknown => "",
        }
        .to_string(),
    );
    s.charge_pct = charge;
    s
}

pub fn snapshot_at(ts: DateTime<Utc>, line_state: LineState, charge: Option<f64>) -> StatusSnapshot {
    let mut s = snapshot(line_state, charge);
    s.timestamp = ts;
    s
}

/// 构造规则
pub fn rule(name: &str, condition: RuleCondition, interval: Option<u64>) -> AlertRule {
    AlertRule {
        name: name.to_string(),
        condition,
        repeat_interval_seconds: interval,
        channels: Vec::new(),
    }
}

/// 指向不可达地址的 webhook 渠道
pub fn unreachable_webhook(name: &str) -> NotificationChannel {
    NotificationChannel {
        name: name.to_string(),
        enabled: true,
        kind: ChannelKind::Webhook(WebhookConfig {
            url: "http://127.0.0.1:1/hook".to_string(),
            method: "POST".to_string(),
            headers: HashMap::new(),
            timeout_seconds: 2,
        }),
    }
}

pub fn email_channel(name: &str, recipients: &[&str]) -> NotificationChannel {
    NotificationChannel {
        name: name.to_string(),
        enabled: true,
        kind: ChannelKind::Email(EmailConfig {
            smtp_host: "smtp.example.com".to_string(),
            smtp_port: 587,
            username: None,
            password: None,
            use_tls: true,
            from_address: "ups@example.com".to_string(),
            recipients: recipients.iter().map(|r| r.to_string()).collect(),
            timeout_seconds: 5,
        }),
    }
}

/// 修改渠道的单次发送超时
pub fn with_timeout(mut channel: NotificationChannel, secs: u64) -> NotificationChannel {
    match &mut channel.kind {
        ChannelKind::Webhook(cfg) => cfg.timeout_seconds = secs,
        ChannelKind::Email(cfg) => cfg.timeout_seconds = secs,
        ChannelKind::Sms(cfg) => cfg.timeout_seconds = secs,
    }
    channel
}

/// 指向指定地址的 webhook 渠道
pub fn webhook_to(name: &str, url: &str, timeout_seconds: u64) -> NotificationChannel {
    NotificationChannel {
        name: name.to_string(),
        enabled: true,
        kind: ChannelKind::Webhook(WebhookConfig {
            url: url.to_string(),
            method: "POST".to_string(),
            headers: HashMap::new(),
            timeout_seconds,
        }),
    }
}

/// 断言结果是成功的
#[macro_export]
macro_rules! assert_ok {
    ($expr:expr) => {
        match $expr {
            Ok(val) => val,
            Err(e) => panic!("Expected Ok, got Err: {:?}", e),
        }
    };
}

/// 断言结果是错误的
#[macro_export]
macro_rules! assert_err {
    ($expr:expr) => {
        match $expr {
            Ok(val) => panic!("Expected Err, got Ok: {:?}", val),
            Err(e) => e,
        }
    };
}
