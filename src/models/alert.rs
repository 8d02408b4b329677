//! 预警模型

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// 预警级别
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "alert_level", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Info,
    Warning,
    Critical,
}

/// 规则类型
///
/// 也是重复抑制表 `last_fired` 的键。电压规则按测量来源区分。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "rule_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    BatteryLevel,
    Runtime,
    InputVoltage,
    OutputVoltage,
    BatteryVoltage,
    Temperature,
    BadBatteryPacks,
    BatteryDelta,
    RuntimeDelta,
    LineStatus,
    Connectivity,
    HealthReport,
}

impl RuleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleKind::BatteryLevel => "battery_level",
            RuleKind::Runtime => "runtime",
            RuleKind::InputVoltage => "input_voltage",
            RuleKind::OutputVoltage => "output_voltage",
            RuleKind::BatteryVoltage => "battery_voltage",
            RuleKind::Temperature => "temperature",
            RuleKind::BadBatteryPacks => "bad_battery_packs",
            RuleKind::BatteryDelta => "battery_delta",
            RuleKind::RuntimeDelta => "runtime_delta",
            RuleKind::LineStatus => "line_status",
            RuleKind::Connectivity => "connectivity",
            RuleKind::HealthReport => "health_report",
        }
    }

    /// 边沿触发的规则不受重复抑制间隔约束
    pub fn is_edge_triggered(&self) -> bool {
        matches!(
            self,
            RuleKind::BatteryDelta | RuleKind::RuntimeDelta | RuleKind::LineStatus
        )
    }
}

impl std::fmt::Display for RuleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 电压测量来源
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VoltageSource {
    Input,
    Output,
    Battery,
}

/// 规则条件
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleCondition {
    /// 电量 ≤ low 触发警告，≤ critical 触发严重预警
    BatteryLevel {
        low: f64,
        #[serde(default)]
        critical: Option<f64>,
    },
    /// 剩余运行时间 ≤ below_seconds
    Runtime { below_seconds: u64 },
    /// 电压超出 [low, high]
    Voltage {
        source: VoltageSource,
        low: f64,
        high: f64,
    },
    /// 温度超出 [low, high]
    Temperature { low: f64, high: f64 },
    /// 故障电池组数量 > 0
    BadBatteryPacks,
    /// 相邻两次轮询电量变化 ≥ min_change 个百分点
    BatteryDelta {
        #[serde(default = "default_battery_delta")]
        min_change: f64,
    },
    /// 相邻两次轮询剩余时间变化 ≥ min_change_seconds
    RuntimeDelta {
        #[serde(default = "default_runtime_delta")]
        min_change_seconds: u64,
    },
    /// 线路状态变化，patterns 为空时任意变化都触发
    LineStatus {
        #[serde(default)]
        patterns: Vec<String>,
    },
    /// 状态命令不可用
    Connectivity,
}

fn default_battery_delta() -> f64 { 10.0 }
fn default_runtime_delta() -> u64 { 300 }

impl RuleCondition {
    pub fn kind(&self) -> RuleKind {
        match self {
            RuleCondition::BatteryLevel { .. } => RuleKind::BatteryLevel,
            RuleCondition::Runtime { .. } => RuleKind::Runtime,
            RuleCondition::Voltage { source, .. } => match source {
                VoltageSource::Input => RuleKind::InputVoltage,
                VoltageSource::Output => RuleKind::OutputVoltage,
                VoltageSource::Battery => RuleKind::BatteryVoltage,
            },
            RuleCondition::Temperature { .. } => RuleKind::Temperature,
            RuleCondition::BadBatteryPacks => RuleKind::BadBatteryPacks,
            RuleCondition::BatteryDelta { .. } => RuleKind::BatteryDelta,
            RuleCondition::RuntimeDelta { .. } => RuleKind::RuntimeDelta,
            RuleCondition::LineStatus { .. } => RuleKind::LineStatus,
            RuleCondition::Connectivity => RuleKind::Connectivity,
        }
    }
}

/// 预警规则（来自配置，核心只读）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlertRule {
    pub name: String,
    #[serde(flatten)]
    pub condition: RuleCondition,
    /// 重复抑制间隔（秒）
    #[serde(default)]
    pub repeat_interval_seconds: Option<u64>,
    /// 目标渠道名称，为空表示所有启用的渠道
    #[serde(default)]
    pub channels: Vec<String>,
}

impl AlertRule {
    pub fn kind(&self) -> RuleKind {
        self.condition.kind()
    }
}

/// 预警事件
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct AlertEvent {
    pub id: Uuid,
    pub rule_name: String,
    pub rule_kind: RuleKind,
    pub level: AlertLevel,
    pub message: String,
    pub value: Option<f64>,
    pub threshold: Option<f64>,
    pub triggered_at: DateTime<Utc>,
    pub resolved: bool,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl AlertEvent {
    pub fn new(
        rule_name: &str,
        rule_kind: RuleKind,
        level: AlertLevel,
        message: String,
        value: Option<f64>,
        threshold: Option<f64>,
        triggered_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            rule_name: rule_name.to_string(),
            rule_kind,
            level,
            message,
            value,
            threshold,
            triggered_at,
            resolved: false,
            resolved_at: None,
        }
    }
}

/// 规则评估产生的待分发事件
#[derive(Debug, Clone, PartialEq)]
pub struct FiredEvent {
    pub event: AlertEvent,
    /// 目标渠道名称，为空表示所有启用的渠道
    pub channels: Vec<String>,
}

/// 预警列表查询参数
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AlertListQuery {
    #[validate(range(min = 1, max = 500, message = "查询数量应在 1-500 之间"))]
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 { 20 }
