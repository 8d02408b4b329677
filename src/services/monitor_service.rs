//! 监控循环
//!
//! 单个后台任务按固定间隔轮询 UPS 状态，依次完成规则评估、通知分发与持久化，
//! 并把结果写入实时状态供读 API 使用。
//!
//! 状态流转：`Idle → Polling → Evaluating → Dispatching → Persisting → Idle`，
//! 轮询或存储失败时进入 `Backoff`。
//!
//! 持久化失败的周期记录（通知已经发出）保留在待写队列中，
//! 下个周期评估前按顺序补写，补写成功的快照才会成为 `previous`。

use crate::models::{FiredEvent, LiveStatus, MonitorState, StatusSnapshot};
use crate::repositories::{CycleRecord, HistoryStore};
use crate::services::{Dispatcher, LastFired, PollError, RuleEngine, StatusSource};
use crate::errors::AppError;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// 待写队列上限，超出后丢弃最旧的记录
pub const MAX_PENDING_CYCLES: usize = 256;

/// 一个监控周期的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Completed,
    PollFailed,
    StoreFailed,
}

impl CycleOutcome {
    pub fn needs_backoff(&self) -> bool {
        !matches!(self, CycleOutcome::Completed)
    }
}

/// 监控循环
pub struct Monitor {
    source: Arc<dyn StatusSource>,
    engine: RuleEngine,
    dispatcher: Arc<Dispatcher>,
    store: Arc<dyn HistoryStore>,
    live: Arc<RwLock<LiveStatus>>,
    poll_interval: Duration,
    backoff: Duration,
    previous: Option<StatusSnapshot>,
    last_fired: LastFired,
    pending: VecDeque<CycleRecord>,
}

impl Monitor {
    pub fn new(
        source: Arc<dyn StatusSource>,
        engine: RuleEngine,
        dispatcher: Arc<Dispatcher>,
        store: Arc<dyn HistoryStore>,
        live: Arc<RwLock<LiveStatus>>,
        poll_interval: Duration,
        backoff: Duration,
    ) -> Self {
        let mut last_fired = LastFired::new();
        engine.prime(&mut last_fired, Utc::now());

        Self {
            source,
            engine,
            dispatcher,
            store,
            live,
            poll_interval,
            backoff,
            previous: None,
            last_fired,
            pending: VecDeque::new(),
        }
    }

    /// 最近一次成功持久化的快照
    pub fn previous(&self) -> Option<&StatusSnapshot> {
        self.previous.as_ref()
    }

    /// 尚未写入存储的周期数
    pub fn pending_cycles(&self) -> usize {
        self.pending.len()
    }

    /// 运行直到取消
    ///
    /// 轮询阶段收到取消会丢弃子进程（随之被终止）；
    /// 一旦轮询完成，本周期的持久化会在退出前完成。
    pub async fn run(mut self, cancel: CancellationToken) {
        tracing::info!(
            poll_interval_secs = self.poll_interval.as_secs(),
            backoff_secs = self.backoff.as_secs(),
            "监控循环已启动"
        );

        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {}
            }

            self.set_state(MonitorState::Polling).await;
            let polled = tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("轮询被取消");
                    break;
                }
                polled = self.source.poll() => polled,
            };

            let outcome = self.process(polled, Utc::now()).await;

            if outcome.needs_backoff() {
                self.set_state(MonitorState::Backoff).await;
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(self.backoff) => {}
                }
                // 退避结束后重新计时，避免紧接着再次轮询
                interval.reset();
            }
            self.set_state(MonitorState::Idle).await;
        }

        if !self.pending.is_empty() {
            self.set_state(MonitorState::Persisting).await;
            if let Err(e) = self.flush_pending().await {
                tracing::error!(
                    error = %e,
                    pending = self.pending.len(),
                    "退出前补写周期数据失败"
                );
            }
        }

        self.set_state(MonitorState::Stopped).await;
        tracing::info!("监控循环已停止");
    }

    /// 轮询一次并处理结果
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        self.set_state(MonitorState::Polling).await;
        let polled = self.source.poll().await;
        let outcome = self.process(polled, Utc::now()).await;

        let state = if outcome.needs_backoff() {
            MonitorState::Backoff
        } else {
            MonitorState::Idle
        };
        self.set_state(state).await;
        outcome
    }

    /// 处理一次轮询结果
    pub async fn process(
        &mut self,
        polled: Result<StatusSnapshot, PollError>,
        now: DateTime<Utc>,
    ) -> CycleOutcome {
        match polled {
            Ok(snapshot) => self.handle_snapshot(snapshot, now).await,
            Err(e) => self.handle_poll_error(e, now).await,
        }
    }

    async fn handle_snapshot(&mut self, snapshot: StatusSnapshot, now: DateTime<Utc>) -> CycleOutcome {
        tracing::debug!(
            line_state = %snapshot.line_state,
            charge = ?snapshot.charge_pct,
            runtime = ?snapshot.runtime_s,
            "UPS 状态轮询成功"
        );

        // 先补写积压的周期，使 previous 指向最后一个已持久化的快照
        if !self.pending.is_empty() {
            self.set_state(MonitorState::Persisting).await;
            if let Err(e) = self.flush_pending().await {
                tracing::warn!(error = %e, pending = self.pending.len(), "补写积压周期失败");
            }
        }

        self.set_state(MonitorState::Evaluating).await;
        let mut fired =
            self.engine
                .evaluate(&snapshot, self.previous.as_ref(), &mut self.last_fired, now);
        if let Some(report) = self.engine.health_report_due(&snapshot, &mut self.last_fired, now) {
            fired.push(report);
        }

        let cycle = self.dispatch_all(fired, Some(snapshot.clone())).await;

        self.set_state(MonitorState::Persisting).await;
        if let Err(e) = self.persist(cycle).await {
            let mut live = self.live.write().await;
            live.error = Some(format!("状态持久化失败: {}", e));
            live.last_poll_attempt = Some(now);
            return CycleOutcome::StoreFailed;
        }

        let mut live = self.live.write().await;
        live.connected = true;
        live.error = None;
        live.snapshot = Some(snapshot);
        live.last_successful_poll = Some(now);
        live.last_poll_attempt = Some(now);

        CycleOutcome::Completed
    }

    async fn handle_poll_error(&mut self, error: PollError, now: DateTime<Utc>) -> CycleOutcome {
        let message = error.to_string();
        tracing::warn!(error = %message, "UPS 状态轮询失败");

        {
            let mut live = self.live.write().await;
            live.connected = false;
            live.error = Some(message.clone());
            live.last_poll_attempt = Some(now);
        }

        let fired = self
            .engine
            .evaluate_connectivity(&message, &mut self.last_fired, now)
            .into_iter()
            .collect();
        let cycle = self.dispatch_all(fired, None).await;

        if !cycle.is_empty() || !self.pending.is_empty() {
            self.set_state(MonitorState::Persisting).await;
            if self.persist(cycle).await.is_err() {
                tracing::warn!(pending = self.pending.len(), "连接预警暂存于待写队列");
            }
        }

        CycleOutcome::PollFailed
    }

    /// 把本周期排到待写队列末尾并依次写入
    async fn persist(&mut self, cycle: CycleRecord) -> Result<(), AppError> {
        if !cycle.is_empty() {
            if self.pending.len() >= MAX_PENDING_CYCLES {
                if let Some(dropped) = self.pending.pop_front() {
                    tracing::error!(
                        events = dropped.events.len(),
                        deliveries = dropped.deliveries.len(),
                        "待写队列已满，丢弃最旧的周期数据"
                    );
                }
            }
            self.pending.push_back(cycle);
        }

        let result = self.flush_pending().await;
        if let Err(e) = &result {
            tracing::error!(error = %e, pending = self.pending.len(), "周期数据持久化失败");
        }
        result
    }

    /// 按顺序写入待写队列，遇到失败即停止
    async fn flush_pending(&mut self) -> Result<(), AppError> {
        while let Some(cycle) = self.pending.front() {
            self.store.record_cycle(cycle).await?;

            if let Some(cycle) = self.pending.pop_front() {
                if let Some(snapshot) = cycle.snapshot {
                    self.previous = Some(snapshot);
                }
            }
        }
        Ok(())
    }

    async fn dispatch_all(
        &self,
        fired: Vec<FiredEvent>,
        snapshot: Option<StatusSnapshot>,
    ) -> CycleRecord {
        let mut deliveries = Vec::new();

        if !fired.is_empty() {
            self.set_state(MonitorState::Dispatching).await;
            for event in &fired {
                deliveries.extend(self.dispatcher.dispatch(event, snapshot.as_ref()).await);
            }
        }

        CycleRecord {
            snapshot,
            events: fired.into_iter().map(|f| f.event).collect(),
            deliveries,
        }
    }

    async fn set_state(&self, state: MonitorState) {
        self.live.write().await.state = state;
    }
}

/// 定期清理过期的状态历史
pub async fn run_retention(
    store: Arc<dyn HistoryStore>,
    retention_days: i64,
    interval: Duration,
    cancel: CancellationToken,
) {
    if retention_days <= 0 {
        tracing::info!("状态历史永久保留，不启动清理任务");
        return;
    }

    tracing::info!(
        retention_days,
        interval_secs = interval.as_secs(),
        "状态历史清理任务已启动"
    );

    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("状态历史清理任务已停止");
                break;
            }
            _ = ticker.tick() => {
                let cutoff = Utc::now() - chrono::Duration::days(retention_days);
                match store.purge_status_before(cutoff).await {
                    Ok(0) => tracing::debug!("没有需要清理的状态历史"),
                    Ok(deleted) => tracing::info!(deleted, "已清理过期状态历史"),
                    Err(e) => tracing::error!(error = %e, "状态历史清理失败"),
                }
            }
        }
    }
}
