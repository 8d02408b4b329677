//! 启动时配置校验
//!
//! 规则与渠道配置错误属于致命错误，进程在进入监控循环前拒绝启动。

use super::Settings;
use crate::errors::AppError;
use crate::models::{ChannelKind, RuleCondition, RuleKind};
use regex::Regex;
use std::collections::HashSet;
use validator::Validate;

impl Settings {
    /// 校验规则和渠道配置
    pub fn validate_monitoring(&self) -> Result<(), AppError> {
        self.ups.validate()?;

        let channel_names = self.validate_channels()?;
        self.validate_rules(&channel_names)?;

        if self.health_report.enabled {
            if self.health_report.report_time().is_none() {
                return Err(AppError::ConfigError(format!(
                    "健康报告时间格式无效: {}（应为 HH:MM）",
                    self.health_report.at
                )));
            }
            check_channel_refs("health_report", &self.health_report.channels, &channel_names)?;
        }

        Ok(())
    }

    fn validate_channels(&self) -> Result<HashSet<String>, AppError> {
        let mut names = HashSet::new();

        for channel in &self.channels {
            if channel.name.trim().is_empty() {
                return Err(AppError::ConfigError("通知渠道名称不能为空".to_string()));
            }
            if !names.insert(channel.name.clone()) {
                return Err(AppError::ConfigError(format!(
                    "通知渠道名称重复: {}",
                    channel.name
                )));
            }

            let result = match &channel.kind {
                ChannelKind::Webhook(cfg) => {
                    if reqwest::Method::from_bytes(cfg.method.to_uppercase().as_bytes()).is_err() {
                        return Err(AppError::ConfigError(format!(
                            "渠道 {} 的 HTTP 方法无效: {}",
                            channel.name, cfg.method
                        )));
                    }
                    cfg.validate()
                }
                ChannelKind::Email(cfg) => cfg.validate(),
                ChannelKind::Sms(cfg) => cfg.validate(),
            };
            result.map_err(|e| {
                AppError::ConfigError(format!("渠道 {} 配置无效: {}", channel.name, e))
            })?;
        }

        if names.is_empty() {
            tracing::warn!("未配置任何通知渠道，预警只会被记录");
        }

        Ok(names)
    }

    fn validate_rules(&self, channel_names: &HashSet<String>) -> Result<(), AppError> {
        let mut kinds: HashSet<RuleKind> = HashSet::new();

        for rule in &self.rules {
            let kind = rule.kind();

            if rule.name.trim().is_empty() {
                return Err(AppError::ConfigError(format!("{} 规则缺少名称", kind)));
            }
            if !kinds.insert(kind) {
                return Err(AppError::ConfigError(format!(
                    "规则类型重复: {}（每种类型只能配置一条规则）",
                    kind
                )));
            }
            if kind.is_edge_triggered() && rule.repeat_interval_seconds.is_some() {
                return Err(AppError::ConfigError(format!(
                    "规则 {} 为边沿触发类型，不支持 repeat_interval_seconds",
                    rule.name
                )));
            }

            check_condition(&rule.name, &rule.condition)?;
            check_channel_refs(&rule.name, &rule.channels, channel_names)?;

            if !kind.is_edge_triggered() && rule.repeat_interval_seconds.is_none() {
                tracing::warn!(
                    rule = %rule.name,
                    kind = %kind,
                    "规则未配置 repeat_interval_seconds，条件持续成立时每个轮询周期都会触发"
                );
            }
        }

        Ok(())
    }
}

fn check_channel_refs(
    owner: &str,
    refs: &[String],
    channel_names: &HashSet<String>,
) -> Result<(), AppError> {
    for name in refs {
        if !channel_names.contains(name) {
            return Err(AppError::ConfigError(format!(
                "{} 引用了不存在的通知渠道: {}",
                owner, name
            )));
        }
    }
    Ok(())
}

fn check_condition(rule_name: &str, condition: &RuleCondition) -> Result<(), AppError> {
    let invalid = |reason: &str| {
        Err(AppError::ConfigError(format!("规则 {} 阈值无效: {}", rule_name, reason)))
    };

    match condition {
        RuleCondition::BatteryLevel { low, critical } => {
            if !(0.0..=100.0).contains(low) {
                return invalid("low 应在 0-100 之间");
            }
            if let Some(critical) = critical {
                if !(0.0..=100.0).contains(critical) || critical > low {
                    return invalid("critical 应在 0-100 之间且不高于 low");
                }
            }
        }
        RuleCondition::Voltage { low, high, .. } | RuleCondition::Temperature { low, high } => {
            if low >= high {
                return invalid("low 必须小于 high");
            }
        }
        RuleCondition::BatteryDelta { min_change } => {
            if *min_change <= 0.0 {
                return invalid("min_change 必须大于 0");
            }
        }
        RuleCondition::RuntimeDelta { min_change_seconds } => {
            if *min_change_seconds == 0 {
                return invalid("min_change_seconds 必须大于 0");
            }
        }
        RuleCondition::LineStatus { patterns } => {
            for pattern in patterns {
                Regex::new(pattern).map_err(|e| {
                    AppError::ConfigError(format!(
                        "规则 {} 的正则表达式无效 {}: {}",
                        rule_name, pattern, e
                    ))
                })?;
            }
        }
        RuleCondition::Runtime { .. }
        | RuleCondition::BadBatteryPacks
        | RuleCondition::Connectivity => {}
    }

    Ok(())
}
