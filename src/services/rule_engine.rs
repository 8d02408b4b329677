//! 预警规则评估
//!
//! 评估是纯函数：除了更新调用方持有的 `last_fired` 表之外没有任何副作用，
//! 当前时间由调用方传入。
//!
//! - 阈值规则在条件成立期间持续触发，受 `repeat_interval_seconds` 抑制
//! - 变化量规则与线路状态规则只在变化发生时触发，不受抑制间隔约束
//! - 每次触发都把 `last_fired[kind]` 更新为触发时刻

use crate::config::HealthReportSettings;
use crate::errors::AppError;
use crate::models::{
    AlertEvent, AlertLevel, AlertRule, FiredEvent, LineState, RuleCondition, RuleKind,
    StatusSnapshot, VoltageSource,
};
use chrono::{DateTime, Local, NaiveTime, Utc};
use regex::Regex;
use std::collections::HashMap;

/// 各规则类型最近一次触发时间
pub type LastFired = HashMap<RuleKind, DateTime<Utc>>;

/// 未配置连接规则时使用的重复抑制间隔（秒）
pub const DEFAULT_CONNECTIVITY_INTERVAL_SECONDS: u64 = 3600;

/// 线路状态变化类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// 市电中断，转为电池供电
    PowerFailure,
    /// 市电恢复
    PowerRestored,
    /// 进入低电量状态
    LowBattery,
    /// 其他变化
    Changed,
}

/// 判断两次线路状态之间的变化类型
pub fn classify_transition(previous: LineState, current: LineState) -> Transition {
    match (previous, current) {
        (p, LineState::LowBattery) if p != LineState::LowBattery => Transition::LowBattery,
        (p, LineState::OnBattery) if !p.is_on_battery() => Transition::PowerFailure,
        (p, LineState::OnLine) if p.is_on_battery() => Transition::PowerRestored,
        _ => Transition::Changed,
    }
}

struct CompiledRule {
    rule: AlertRule,
    patterns: Vec<Regex>,
}

struct HealthReportPlan {
    at: NaiveTime,
    channels: Vec<String>,
}

/// 规则评估器
pub struct RuleEngine {
    rules: Vec<CompiledRule>,
    connectivity: AlertRule,
    health_report: Option<HealthReportPlan>,
}

impl RuleEngine {
    /// 编译规则；正则或报告时间无效时返回配置错误
    pub fn new(rules: &[AlertRule], health_report: &HealthReportSettings) -> Result<Self, AppError> {
        let mut compiled = Vec::with_capacity(rules.len());
        let mut connectivity = None;

        for rule in rules {
            if let RuleCondition::Connectivity = rule.condition {
                connectivity = Some(rule.clone());
                continue;
            }

            let patterns = match &rule.condition {
                RuleCondition::LineStatus { patterns } => patterns
                    .iter()
                    .map(|p| {
                        Regex::new(p).map_err(|e| {
                            AppError::ConfigError(format!("正则表达式无效 {}: {}", p, e))
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?,
                _ => Vec::new(),
            };

            compiled.push(CompiledRule {
                rule: rule.clone(),
                patterns,
            });
        }

        let connectivity = connectivity.unwrap_or_else(|| AlertRule {
            name: "UPS 连接".to_string(),
            condition: RuleCondition::Connectivity,
            repeat_interval_seconds: Some(DEFAULT_CONNECTIVITY_INTERVAL_SECONDS),
            channels: Vec::new(),
        });

        let health_report = if health_report.enabled {
            let at = health_report.report_time().ok_or_else(|| {
                AppError::ConfigError(format!("健康报告时间格式无效: {}", health_report.at))
            })?;
            Some(HealthReportPlan {
                at,
                channels: health_report.channels.clone(),
            })
        } else {
            None
        };

        Ok(Self {
            rules: compiled,
            connectivity,
            health_report,
        })
    }

    /// 评估一次成功轮询的快照
    pub fn evaluate(
        &self,
        current: &StatusSnapshot,
        previous: Option<&StatusSnapshot>,
        last_fired: &mut LastFired,
        now: DateTime<Utc>,
    ) -> Vec<FiredEvent> {
        let mut fired = Vec::new();

        for compiled in &self.rules {
            let rule = &compiled.rule;
            let kind = rule.kind();

            if !kind.is_edge_triggered() && !repeat_allowed(rule, last_fired, now) {
                tracing::debug!(rule = %rule.name, kind = %kind, "规则处于重复抑制期内");
                continue;
            }

            let candidate = match &rule.condition {
                RuleCondition::LineStatus { .. } => {
                    line_status_event(rule, &compiled.patterns, current, previous, now)
                }
                // 没有上一次快照时变化量规则不评估
                RuleCondition::BatteryDelta { min_change } => previous
                    .and_then(|prev| battery_delta_event(rule, *min_change, current, prev, now)),
                RuleCondition::RuntimeDelta { min_change_seconds } => previous.and_then(|prev| {
                    runtime_delta_event(rule, *min_change_seconds, current, prev, now)
                }),
                condition => threshold_event(rule, condition, current, now),
            };

            if let Some(event) = candidate {
                last_fired.insert(kind, now);
                tracing::info!(
                    rule = %rule.name,
                    kind = %kind,
                    level = ?event.level,
                    value = ?event.value,
                    threshold = ?event.threshold,
                    "触发预警"
                );
                fired.push(FiredEvent {
                    event,
                    channels: rule.channels.clone(),
                });
            }
        }

        fired
    }

    /// 轮询失败时评估连接规则
    pub fn evaluate_connectivity(
        &self,
        error: &str,
        last_fired: &mut LastFired,
        now: DateTime<Utc>,
    ) -> Option<FiredEvent> {
        let rule = &self.connectivity;
        if !repeat_allowed(rule, last_fired, now) {
            tracing::debug!(error, "连接预警处于重复抑制期内");
            return None;
        }

        last_fired.insert(RuleKind::Connectivity, now);
        tracing::warn!(rule = %rule.name, error, "触发连接预警");

        Some(FiredEvent {
            event: AlertEvent::new(
                &rule.name,
                RuleKind::Connectivity,
                AlertLevel::Critical,
                format!("无法获取 UPS 状态: {}", error),
                None,
                None,
                now,
            ),
            channels: rule.channels.clone(),
        })
    }

    /// 启动时调用：如果今天的报告时间已过，则今天不再发送健康报告
    pub fn prime(&self, last_fired: &mut LastFired, now: DateTime<Utc>) {
        if let Some(plan) = &self.health_report {
            if now.with_timezone(&Local).time() >= plan.at {
                last_fired.entry(RuleKind::HealthReport).or_insert(now);
            }
        }
    }

    /// 每日健康报告，每个本地日期最多一次
    pub fn health_report_due(
        &self,
        current: &StatusSnapshot,
        last_fired: &mut LastFired,
        now: DateTime<Utc>,
    ) -> Option<FiredEvent> {
        let plan = self.health_report.as_ref()?;
        let local_now = now.with_timezone(&Local);

        if local_now.time() < plan.at {
            return None;
        }
        if let Some(last) = last_fired.get(&RuleKind::HealthReport) {
            if last.with_timezone(&Local).date_naive() == local_now.date_naive() {
                return None;
            }
        }

        last_fired.insert(RuleKind::HealthReport, now);

        let message = format!(
            "UPS 每日健康报告 {}\n{}",
            local_now.format("%Y-%m-%d"),
            current.summary_lines().join("\n")
        );

        Some(FiredEvent {
            event: AlertEvent::new(
                "每日健康报告",
                RuleKind::HealthReport,
                AlertLevel::Info,
                message,
                current.charge_pct,
                None,
                now,
            ),
            channels: plan.channels.clone(),
        })
    }
}

/// 没有配置间隔或从未触发时允许触发
fn repeat_allowed(rule: &AlertRule, last_fired: &LastFired, now: DateTime<Utc>) -> bool {
    match (rule.repeat_interval_seconds, last_fired.get(&rule.kind())) {
        (Some(interval), Some(last)) => {
            let interval = i64::try_from(interval).unwrap_or(i64::MAX);
            now.signed_duration_since(*last).num_seconds() >= interval
        }
        _ => true,
    }
}

fn threshold_event(
    rule: &AlertRule,
    condition: &RuleCondition,
    current: &StatusSnapshot,
    now: DateTime<Utc>,
) -> Option<AlertEvent> {
    let event = |level, message: String, value: f64, threshold: f64| {
        AlertEvent::new(
            &rule.name,
            rule.kind(),
            level,
            message,
            Some(value),
            Some(threshold),
            now,
        )
    };

    match condition {
        RuleCondition::BatteryLevel { low, critical } => {
            let charge = current.charge_pct?;
            match critical {
                Some(critical) if charge <= *critical => Some(event(
                    AlertLevel::Critical,
                    format!("UPS 电池电量严重不足: {:.0}%", charge),
                    charge,
                    *critical,
                )),
                _ if charge <= *low => Some(event(
                    AlertLevel::Warning,
                    format!("UPS 电池电量低: {:.0}%", charge),
                    charge,
                    *low,
                )),
                _ => None,
            }
        }
        RuleCondition::Runtime { below_seconds } => {
            let runtime = current.runtime_s?;
            (runtime <= *below_seconds).then(|| {
                event(
                    AlertLevel::Warning,
                    format!("UPS 剩余运行时间不足: {} 分 {} 秒", runtime / 60, runtime % 60),
                    runtime as f64,
                    *below_seconds as f64,
                )
            })
        }
        RuleCondition::Voltage { source, low, high } => {
            let (label, value) = match source {
                VoltageSource::Input => ("输入电压", current.input_v?),
                VoltageSource::Output => ("输出电压", current.output_v?),
                VoltageSource::Battery => ("电池电压", current.battery_v?),
            };
            out_of_band(value, *low, *high).map(|(direction, threshold)| {
                event(
                    AlertLevel::Warning,
                    format!("UPS {}{}: {:.1}V", label, direction, value),
                    value,
                    threshold,
                )
            })
        }
        RuleCondition::Temperature { low, high } => {
            let value = current.temperature_c?;
            out_of_band(value, *low, *high).map(|(direction, threshold)| {
                event(
                    AlertLevel::Warning,
                    format!("UPS 温度{}: {:.1}°C", direction, value),
                    value,
                    threshold,
                )
            })
        }
        RuleCondition::BadBatteryPacks => {
            let bad = current.bad_packs?;
            (bad > 0).then(|| {
                event(
                    AlertLevel::Critical,
                    format!("检测到 {} 组故障电池，请尽快更换", bad),
                    bad as f64,
                    0.0,
                )
            })
        }
        _ => None,
    }
}

/// 超出闭区间时返回方向描述和被越过的阈值
fn out_of_band(value: f64, low: f64, high: f64) -> Option<(&'static str, f64)> {
    if value < low {
        Some(("过低", low))
    } else if value > high {
        Some(("过高", high))
    } else {
        None
    }
}

fn battery_delta_event(
    rule: &AlertRule,
    min_change: f64,
    current: &StatusSnapshot,
    previous: &StatusSnapshot,
    now: DateTime<Utc>,
) -> Option<AlertEvent> {
    let before = previous.charge_pct?;
    let after = current.charge_pct?;
    let delta = after - before;
    if delta.abs() < min_change {
        return None;
    }

    let (level, verb) = if delta < 0.0 {
        (AlertLevel::Warning, "下降")
    } else {
        (AlertLevel::Info, "上升")
    };

    Some(AlertEvent::new(
        &rule.name,
        RuleKind::BatteryDelta,
        level,
        format!(
            "UPS 电池电量{} {:.0} 个百分点（{:.0}% → {:.0}%）",
            verb,
            delta.abs(),
            before,
            after
        ),
        Some(delta.abs()),
        Some(min_change),
        now,
    ))
}

fn runtime_delta_event(
    rule: &AlertRule,
    min_change_seconds: u64,
    current: &StatusSnapshot,
    previous: &StatusSnapshot,
    now: DateTime<Utc>,
) -> Option<AlertEvent> {
    let before = previous.runtime_s?;
    let after = current.runtime_s?;
    let delta = after.abs_diff(before);
    if delta < min_change_seconds {
        return None;
    }

    let (level, verb) = if after < before {
        (AlertLevel::Warning, "减少")
    } else {
        (AlertLevel::Info, "增加")
    };

    Some(AlertEvent::new(
        &rule.name,
        RuleKind::RuntimeDelta,
        level,
        format!(
            "UPS 剩余运行时间{} {} 秒（{} 秒 → {} 秒）",
            verb, delta, before, after
        ),
        Some(delta as f64),
        Some(min_change_seconds as f64),
        now,
    ))
}

fn line_status_event(
    rule: &AlertRule,
    patterns: &[Regex],
    current: &StatusSnapshot,
    previous: Option<&StatusSnapshot>,
    now: DateTime<Utc>,
) -> Option<AlertEvent> {
    let status_text = current.ups_status.as_deref().unwrap_or("");
    let matches = patterns
        .iter()
        .any(|re| re.is_match(status_text) || re.is_match(current.line_state.as_str()));

    let (level, message) = match previous {
        // 首次轮询只在显式模式匹配时通知初始状态
        None => {
            if !matches {
                return None;
            }
            (
                AlertLevel::Info,
                format!("UPS 当前线路状态: {}", current.line_state),
            )
        }
        Some(previous) => {
            if previous.line_state == current.line_state {
                return None;
            }
            if !patterns.is_empty() && !matches {
                return None;
            }
            match classify_transition(previous.line_state, current.line_state) {
                Transition::PowerFailure => (
                    AlertLevel::Warning,
                    "市电中断，UPS 已切换到电池供电".to_string(),
                ),
                Transition::LowBattery => (
                    AlertLevel::Critical,
                    "UPS 进入低电量状态，即将关机".to_string(),
                ),
                Transition::PowerRestored => {
                    (AlertLevel::Info, "市电已恢复，UPS 切回市电供电".to_string())
                }
                Transition::Changed => (
                    AlertLevel::Info,
                    format!(
                        "UPS 线路状态变化: {} → {}",
                        previous.line_state, current.line_state
                    ),
                ),
            }
        }
    };

    Some(AlertEvent::new(
        &rule.name,
        RuleKind::LineStatus,
        level,
        message,
        None,
        None,
        now,
    ))
}
