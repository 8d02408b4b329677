//! 监控循环对外发布的实时状态

use crate::models::StatusSnapshot;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// 监控循环状态机
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MonitorState {
    Idle,
    Polling,
    Evaluating,
    Dispatching,
    Persisting,
    Backoff,
    Stopped,
}

/// 实时状态，监控循环每个周期写入一次，读 API 只读
#[derive(Debug, Clone, Serialize)]
pub struct LiveStatus {
    pub state: MonitorState,
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// 最近一次成功轮询得到的快照
    pub snapshot: Option<StatusSnapshot>,
    pub last_successful_poll: Option<DateTime<Utc>>,
    pub last_poll_attempt: Option<DateTime<Utc>>,
}

impl Default for LiveStatus {
    fn default() -> Self {
        Self {
            state: MonitorState::Idle,
            connected: false,
            error: Some("尚未完成首次轮询".to_string()),
            snapshot: None,
            last_successful_poll: None,
            last_poll_attempt: None,
        }
    }
}
