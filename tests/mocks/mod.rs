//! Mock 对象

#![allow(dead_code)]

use chrono::{DateTime, Utc};
use lettre::Message;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use upsentry::errors::{AppError, NotifyError};
use upsentry::models::{
    AlertEvent, DeliveryRecord, EmailConfig, SendOutcome, SmsConfig, StatusSnapshot,
};
use upsentry::repositories::{CycleRecord, HistoryStore, InMemoryHistoryStore};
use upsentry::services::{MailTransport, PollError, SmsGateway, StatusSource};
use uuid::Uuid;

/// 按顺序返回预设结果的状态源
#[derive(Default)]
pub struct ScriptedStatusSource {
    results: Mutex<VecDeque<Result<StatusSnapshot, PollError>>>,
    polls: AtomicUsize,
}

impl ScriptedStatusSource {
    pub fn new(results: Vec<Result<StatusSnapshot, PollError>>) -> Self {
        Self {
            results: Mutex::new(results.into()),
            polls: AtomicUsize::new(0),
        }
    }

    pub fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl StatusSource for ScriptedStatusSource {
    async fn poll(&self) -> Result<StatusSnapshot, PollError> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        self.results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(PollError::EmptyOutput))
    }
}

/// 记录所有收件人的邮件传输
#[derive(Default)]
pub struct RecordingMailTransport {
    pub sent: Mutex<Vec<String>>,
}

impl RecordingMailTransport {
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl MailTransport for RecordingMailTransport {
    async fn send(&self, _config: &EmailConfig, message: Message) -> Result<(), NotifyError> {
        let mut sent = self.sent.lock().unwrap();
        for to in message.envelope().to() {
            sent.push(to.to_string());
        }
        Ok(())
    }
}

/// 对指定收件人返回失败的邮件传输
pub struct FailingMailTransport {
    pub reject: String,
}

#[async_trait::async_trait]
impl MailTransport for FailingMailTransport {
    async fn send(&self, _config: &EmailConfig, message: Message) -> Result<(), NotifyError> {
        if message
            .envelope()
            .to()
            .iter()
            .any(|to| to.to_string() == self.reject)
        {
            Err(NotifyError::Mail("550 mailbox unavailable".to_string()))
        } else {
            Ok(())
        }
    }
}

/// 按收件人延迟发送的邮件传输，记录成功送达的收件人
#[derive(Default)]
pub struct SlowMailTransport {
    pub delays: HashMap<String, Duration>,
    pub sent: Mutex<Vec<String>>,
}

impl SlowMailTransport {
    pub fn new(delays: &[(&str, u64)]) -> Self {
        Self {
            delays: delays
                .iter()
                .map(|(to, ms)| (to.to_string(), Duration::from_millis(*ms)))
                .collect(),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl MailTransport for SlowMailTransport {
    async fn send(&self, _config: &EmailConfig, message: Message) -> Result<(), NotifyError> {
        for to in message.envelope().to() {
            let to = to.to_string();
            if let Some(delay) = self.delays.get(&to) {
                tokio::time::sleep(*delay).await;
            }
            self.sent.lock().unwrap().push(to);
        }
        Ok(())
    }
}

/// 记录短信的网关
#[derive(Default)]
pub struct RecordingSmsGateway {
    pub sent: Mutex<Vec<(String, String)>>,
}

#[async_trait::async_trait]
impl SmsGateway for RecordingSmsGateway {
    async fn send_sms(
        &self,
        _config: &SmsConfig,
        to: &str,
        body: &str,
    ) -> Result<SendOutcome, NotifyError> {
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), body.to_string()));
        Ok(SendOutcome {
            response_code: Some(201),
        })
    }
}

/// 写入可按需失败的存储，读操作委托给内存存储
pub struct FailingStore {
    pub inner: InMemoryHistoryStore,
    pub fail_writes: Arc<Mutex<bool>>,
}

impl FailingStore {
    pub fn new() -> Self {
        Self {
            inner: InMemoryHistoryStore::new(100),
            fail_writes: Arc::new(Mutex::new(true)),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        *self.fail_writes.lock().unwrap() = failing;
    }

    fn check(&self) -> Result<(), AppError> {
        if *self.fail_writes.lock().unwrap() {
            Err(AppError::Unavailable("存储不可用".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait::async_trait]
impl HistoryStore for FailingStore {
    async fn append_status(&self, snapshot: &StatusSnapshot) -> Result<(), AppError> {
        self.check()?;
        self.inner.append_status(snapshot).await
    }

    async fn append_alerts(&self, events: &[AlertEvent]) -> Result<(), AppError> {
        self.check()?;
        self.inner.append_alerts(events).await
    }

    async fn append_deliveries(&self, deliveries: &[DeliveryRecord]) -> Result<(), AppError> {
        self.check()?;
        self.inner.append_deliveries(deliveries).await
    }

    async fn record_cycle(&self, cycle: &CycleRecord) -> Result<(), AppError> {
        self.check()?;
        self.inner.record_cycle(cycle).await
    }

    async fn latest_status(&self) -> Result<Option<StatusSnapshot>, AppError> {
        self.inner.latest_status().await
    }

    async fn recent_status(&self, limit: i64) -> Result<Vec<StatusSnapshot>, AppError> {
        self.inner.recent_status(limit).await
    }

    async fn recent_alerts(&self, limit: i64) -> Result<Vec<AlertEvent>, AppError> {
        self.inner.recent_alerts(limit).await
    }

    async fn recent_deliveries(&self, limit: i64) -> Result<Vec<DeliveryRecord>, AppError> {
        self.inner.recent_deliveries(limit).await
    }

    async fn resolve_alert(&self, id: Uuid, at: DateTime<Utc>) -> Result<AlertEvent, AppError> {
        self.inner.resolve_alert(id, at).await
    }

    async fn purge_status_before(&self, cutoff: DateTime<Utc>) -> Result<u64, AppError> {
        self.inner.purge_status_before(cutoff).await
    }

    async fn health_check(&self) -> Result<(), AppError> {
        self.check()
    }
}
