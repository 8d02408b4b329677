//! UPS 状态源适配器
//!
//! 调用外部状态命令（默认 `upsc ups@localhost`），把 `key: value` 输出解析为
//! [`StatusSnapshot`]。命令在独立子进程中运行，超时或被取消时子进程会被杀掉。

use crate::config::UpsSettings;
use crate::models::{LineState, StatusSnapshot};
use chrono::{DateTime, Utc};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// 轮询失败原因，均表示 UPS 暂不可用
#[derive(Debug, thiserror::Error)]
pub enum PollError {
    #[error("状态命令未配置")]
    NotConfigured,

    #[error("无法执行状态命令: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("状态命令超时（{0} 秒）")]
    Timeout(u64),

    #[error("状态命令异常退出（退出码 {code:?}）: {stderr}")]
    NonZeroExit { code: Option<i32>, stderr: String },

    #[error("状态命令没有输出")]
    EmptyOutput,
}

/// 状态源
#[async_trait::async_trait]
pub trait StatusSource: Send + Sync {
    /// 查询一次 UPS 状态
    async fn poll(&self) -> Result<StatusSnapshot, PollError>;
}

/// 通过外部命令查询 UPS 状态
#[derive(Debug, Clone)]
pub struct CommandStatusSource {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandStatusSource {
    pub fn new(command_line: &str, timeout: Duration) -> Self {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts.next().unwrap_or_default();
        Self {
            program,
            args: parts.collect(),
            timeout,
        }
    }

    pub fn from_settings(settings: &UpsSettings) -> Self {
        Self::new(
            &settings.status_command,
            Duration::from_secs(settings.command_timeout_seconds),
        )
    }
}

#[async_trait::async_trait]
impl StatusSource for CommandStatusSource {
    async fn poll(&self) -> Result<StatusSnapshot, PollError> {
        if self.program.is_empty() {
            return Err(PollError::NotConfigured);
        }

        let child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        // 超时或外层 future 被丢弃时 child 随之丢弃并被杀掉
        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| PollError::Timeout(self.timeout.as_secs()))??;

        if !output.status.success() {
            return Err(PollError::NonZeroExit {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        if stdout.trim().is_empty() {
            return Err(PollError::EmptyOutput);
        }

        Ok(parse_status(&stdout, Utc::now()))
    }
}

/// 解析 `key: value` 格式的状态输出
///
/// 单个字段解析失败或越界时该字段为 `None`，不影响其余字段。未识别的键保存在 `extra` 中。
pub fn parse_status(output: &str, timestamp: DateTime<Utc>) -> StatusSnapshot {
    let mut snapshot = StatusSnapshot::empty(timestamp, LineState::Unknown);
    let mut ups_temperature = None;

    for line in output.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim();
        let value = value.trim();
        if key.is_empty() {
            continue;
        }

        match key {
            "ups.status" => {
                snapshot.line_state = LineState::from_status_flags(value);
                snapshot.ups_status = Some(value.to_string());
            }
            "battery.charge" => snapshot.charge_pct = parse_percent(key, value),
            "ups.load" => snapshot.load_pct = parse_percent(key, value),
            "battery.runtime" => snapshot.runtime_s = parse_runtime(key, value),
            "input.voltage" => snapshot.input_v = parse_non_negative(key, value),
            "output.voltage" => snapshot.output_v = parse_non_negative(key, value),
            "battery.voltage" => snapshot.battery_v = parse_non_negative(key, value),
            "battery.temperature" => snapshot.temperature_c = parse_finite(key, value),
            "ups.temperature" => ups_temperature = parse_finite(key, value),
            "battery.packs.bad" => snapshot.bad_packs = parse_count(key, value),
            _ => {
                snapshot.extra.insert(key.to_string(), value.to_string());
            }
        }
    }

    if snapshot.temperature_c.is_none() {
        snapshot.temperature_c = ups_temperature;
    }

    snapshot
}

fn parse_finite(key: &str, value: &str) -> Option<f64> {
    match value.parse::<f64>() {
        Ok(v) if v.is_finite() => Some(v),
        _ => {
            tracing::debug!(key, value, "状态字段无法解析为数值，已忽略");
            None
        }
    }
}

fn parse_non_negative(key: &str, value: &str) -> Option<f64> {
    parse_finite(key, value).filter(|v| {
        let ok = *v >= 0.0;
        if !ok {
            tracing::debug!(key, value, "状态字段为负值，已忽略");
        }
        ok
    })
}

/// 运行时间以秒为单位取整，必须能存入 BIGINT 列
fn parse_runtime(key: &str, value: &str) -> Option<u64> {
    parse_non_negative(key, value)
        .filter(|v| {
            let ok = *v < i64::MAX as f64;
            if !ok {
                tracing::warn!(key, value, "运行时间超出范围，已忽略");
            }
            ok
        })
        .map(|v| v.round() as u64)
}

/// 百分比字段越界视为解析失败，不做截断
fn parse_percent(key: &str, value: &str) -> Option<f64> {
    parse_finite(key, value).filter(|v| {
        let ok = (0.0..=100.0).contains(v);
        if !ok {
            tracing::warn!(key, value, "百分比字段超出 0-100 范围，已忽略");
        }
        ok
    })
}

/// 计数必须能存入 INTEGER 列
fn parse_count(key: &str, value: &str) -> Option<u32> {
    value
        .parse::<u32>()
        .ok()
        .filter(|v| i32::try_from(*v).is_ok())
        .or_else(|| {
            tracing::debug!(key, value, "计数字段无法解析，已忽略");
            None
        })
}
