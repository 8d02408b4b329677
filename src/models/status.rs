//! UPS 状态快照模型

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use std::collections::BTreeMap;

/// 市电线路状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "line_state", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum LineState {
    OnLine,
    OnBattery,
    LowBattery,
    Unknown,
}

impl LineState {
    /// 根据 `ups.status` 字段的标志位推导线路状态
    ///
    /// `LB` 优先于 `OB`，`OB` 优先于 `OL`。
    pub fn from_status_flags(raw: &str) -> Self {
        let flags: Vec<&str> = raw.split_whitespace().collect();
        if flags.contains(&"LB") {
            LineState::LowBattery
        } else if flags.contains(&"OB") {
            LineState::OnBattery
        } else if flags.contains(&"OL") {
            LineState::OnLine
        } else {
            LineState::Unknown
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LineState::OnLine => "on_line",
            LineState::OnBattery => "on_battery",
            LineState::LowBattery => "low_battery",
            LineState::Unknown => "unknown",
        }
    }

    /// 是否依靠电池供电
    pub fn is_on_battery(&self) -> bool {
        matches!(self, LineState::OnBattery | LineState::LowBattery)
    }
}

impl std::fmt::Display for LineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 单次轮询得到的 UPS 状态快照
///
/// 创建后不再修改，只会被下一次快照取代。数值字段在解析失败或越界时为 `None`。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusSnapshot {
    pub timestamp: DateTime<Utc>,
    pub line_state: LineState,
    /// 原始 `ups.status` 字符串，例如 `OL CHRG`
    pub ups_status: Option<String>,
    pub charge_pct: Option<f64>,
    pub runtime_s: Option<u64>,
    pub load_pct: Option<f64>,
    pub input_v: Option<f64>,
    pub output_v: Option<f64>,
    pub battery_v: Option<f64>,
    pub temperature_c: Option<f64>,
    pub bad_packs: Option<u32>,
    /// 未识别的键值对，原样保留
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

impl StatusSnapshot {
    /// 创建只有时间戳和线路状态的空快照
    pub fn empty(timestamp: DateTime<Utc>, line_state: LineState) -> Self {
        Self {
            timestamp,
            line_state,
            ups_status: None,
            charge_pct: None,
            runtime_s: None,
            load_pct: None,
            input_v: None,
            output_v: None,
            battery_v: None,
            temperature_c: None,
            bad_packs: None,
            extra: BTreeMap::new(),
        }
    }

    /// 生成用于通知正文的多行摘要
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = vec![format!("线路状态: {}", self.line_state)];
        if let Some(raw) = &self.ups_status {
            lines.push(format!("ups.status: {}", raw));
        }
        if let Some(v) = self.charge_pct {
            lines.push(format!("电池电量: {:.0}%", v));
        }
        if let Some(v) = self.runtime_s {
            lines.push(format!("剩余时间: {} 分 {} 秒", v / 60, v % 60));
        }
        if let Some(v) = self.load_pct {
            lines.push(format!("负载: {:.0}%", v));
        }
        if let Some(v) = self.input_v {
            lines.push(format!("输入电压: {:.1}V", v));
        }
        if let Some(v) = self.output_v {
            lines.push(format!("输出电压: {:.1}V", v));
        }
        if let Some(v) = self.battery_v {
            lines.push(format!("电池电压: {:.1}V", v));
        }
        if let Some(v) = self.temperature_c {
            lines.push(format!("温度: {:.1}°C", v));
        }
        if let Some(v) = self.bad_packs {
            lines.push(format!("故障电池组: {}", v));
        }
        lines
    }
}

/// 状态历史表行
#[derive(Debug, Clone, FromRow)]
pub struct StatusHistoryRow {
    pub id: i64,
    pub recorded_at: DateTime<Utc>,
    pub line_state: LineState,
    pub ups_status: Option<String>,
    pub charge_pct: Option<f64>,
    pub runtime_s: Option<i64>,
    pub load_pct: Option<f64>,
    pub input_v: Option<f64>,
    pub output_v: Option<f64>,
    pub battery_v: Option<f64>,
    pub temperature_c: Option<f64>,
    pub bad_packs: Option<i32>,
    pub extra: Json<BTreeMap<String, String>>,
}

impl From<StatusHistoryRow> for StatusSnapshot {
    fn from(row: StatusHistoryRow) -> Self {
        Self {
            timestamp: row.recorded_at,
            line_state: row.line_state,
            ups_status: row.ups_status,
            charge_pct: row.charge_pct,
            runtime_s: row.runtime_s.and_then(|v| u64::try_from(v).ok()),
            load_pct: row.load_pct,
            input_v: row.input_v,
            output_v: row.output_v,
            battery_v: row.battery_v,
            temperature_c: row.temperature_c,
            bad_packs: row.bad_packs.and_then(|v| u32::try_from(v).ok()),
            extra: row.extra.0,
        }
    }
}

/// 状态历史查询参数
#[derive(Debug, Clone, Deserialize, validator::Validate)]
pub struct HistoryQuery {
    #[validate(range(min = 1, max = 1000, message = "查询数量应在 1-1000 之间"))]
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 { 50 }
