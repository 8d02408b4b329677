//! 应用配置加载和管理

use crate::models::{AlertRule, NotificationChannel};
use chrono::NaiveTime;
use config::{Config, ConfigError, Environment, File, FileFormat};
use secrecy::SecretString;
use serde::Deserialize;
use std::env;
use std::time::Duration;
use validator::Validate;

/// 轮询间隔下限（秒）
pub const MIN_POLL_INTERVAL_SECONDS: u64 = 5;

/// 应用配置结构
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    #[serde(default)]
    pub database: DatabaseSettings,
    pub logging: LoggingSettings,
    pub ups: UpsSettings,
    #[serde(default)]
    pub history: HistorySettings,
    #[serde(default)]
    pub health_report: HealthReportSettings,
    #[serde(default)]
    pub rules: Vec<AlertRule>,
    #[serde(default)]
    pub channels: Vec<NotificationChannel>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub workers: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_seconds: u64,
    pub idle_timeout_seconds: u64,
    pub require_ssl: bool,
    #[serde(default = "default_true")]
    pub run_migrations: bool,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            max_connections: 5,
            min_connections: 1,
            connect_timeout_seconds: 10,
            idle_timeout_seconds: 600,
            require_ssl: false,
            run_migrations: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    pub level: String,
    pub format: String,
}

/// UPS 状态源配置
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpsSettings {
    /// 状态查询命令，例如 `upsc ups@localhost`
    #[validate(length(min = 1, message = "状态命令不能为空"))]
    #[serde(default = "default_status_command")]
    pub status_command: String,
    /// 轮询间隔（秒），低于 5 秒时按 5 秒处理
    #[serde(default = "default_poll_interval")]
    pub poll_interval_seconds: u64,
    /// 单次命令超时（秒）
    #[validate(range(min = 1, max = 300, message = "命令超时应在 1-300 秒之间"))]
    #[serde(default = "default_command_timeout")]
    pub command_timeout_seconds: u64,
    /// 轮询失败后的额外退避时间（秒）
    #[serde(default = "default_backoff")]
    pub backoff_seconds: u64,
}

fn default_status_command() -> String { "upsc ups@localhost".to_string() }
fn default_poll_interval() -> u64 { 60 }
fn default_command_timeout() -> u64 { 10 }
fn default_backoff() -> u64 { 60 }
fn default_true() -> bool { true }

/// 历史数据配置
#[derive(Debug, Clone, Deserialize)]
pub struct HistorySettings {
    /// 状态历史保留天数，0 表示永久保留
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
    /// 未配置数据库时内存存储每类记录的容量
    #[serde(default = "default_memory_capacity")]
    pub memory_capacity: usize,
    /// 清理任务执行间隔（秒）
    #[serde(default = "default_purge_interval")]
    pub purge_interval_seconds: u64,
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            retention_days: default_retention_days(),
            memory_capacity: default_memory_capacity(),
            purge_interval_seconds: default_purge_interval(),
        }
    }
}

fn default_retention_days() -> i64 { 30 }
fn default_memory_capacity() -> usize { 10_000 }
fn default_purge_interval() -> u64 { 3600 }

/// 每日健康报告配置
#[derive(Debug, Clone, Deserialize)]
pub struct HealthReportSettings {
    #[serde(default)]
    pub enabled: bool,
    /// 本地时间 `HH:MM`
    #[serde(default = "default_report_at")]
    pub at: String,
    /// 目标渠道名称，为空表示所有启用的渠道
    #[serde(default)]
    pub channels: Vec<String>,
}

impl Default for HealthReportSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            at: default_report_at(),
            channels: Vec::new(),
        }
    }
}

fn default_report_at() -> String { "08:00".to_string() }

impl HealthReportSettings {
    /// 解析报告时间
    pub fn report_time(&self) -> Option<NaiveTime> {
        NaiveTime::parse_from_str(&self.at, "%H:%M").ok()
    }
}

impl Settings {
    /// 从配置文件和环境变量加载配置
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = env::var("APP_ENV").unwrap_or_else(|_| "development".into());

        let settings = Config::builder()
            // 加载默认配置
            .add_source(File::with_name("config/default"))
            // 根据环境加载对应配置
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // 环境变量覆盖，前缀 UPSENTRY，分隔符 __
            .add_source(
                Environment::with_prefix("UPSENTRY")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        settings.try_deserialize()
    }

    /// 从 TOML 文本加载配置
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()
    }

    /// 获取数据库连接 URL（从环境变量），未设置时使用内存存储
    pub fn database_url() -> Option<SecretString> {
        env::var("DATABASE_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(SecretString::new)
    }

    /// 获取操作员 API Key（从环境变量），未设置时写操作不做校验
    pub fn operator_key() -> Option<SecretString> {
        env::var("UPSENTRY_OPERATOR_KEY")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(SecretString::new)
    }

    /// 获取服务器地址
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// 实际使用的轮询间隔
    pub fn poll_interval(&self) -> Duration {
        if self.ups.poll_interval_seconds < MIN_POLL_INTERVAL_SECONDS {
            tracing::warn!(
                configured = self.ups.poll_interval_seconds,
                floor = MIN_POLL_INTERVAL_SECONDS,
                "轮询间隔低于下限，已调整"
            );
            Duration::from_secs(MIN_POLL_INTERVAL_SECONDS)
        } else {
            Duration::from_secs(self.ups.poll_interval_seconds)
        }
    }
}
