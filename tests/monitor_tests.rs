//! 监控循环集成测试

mod helpers;
mod mocks;

use helpers::{at, email_channel, rule, snapshot, snapshot_at};
use mocks::{FailingStore, RecordingMailTransport, RecordingSmsGateway, ScriptedStatusSource};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use upsentry::config::HealthReportSettings;
use upsentry::models::{
    LineState, LiveStatus, MonitorState, RuleCondition, RuleKind, StatusSnapshot,
};
use upsentry::repositories::{HistoryStore, InMemoryHistoryStore};
use upsentry::services::{
    CycleOutcome, Dispatcher, EmailService, Monitor, PollError, RuleEngine, SmsService,
    StatusSource, WebhookService,
};

struct Harness {
    monitor: Monitor,
    live: Arc<RwLock<LiveStatus>>,
    mail: Arc<RecordingMailTransport>,
}

fn harness(
    source: Arc<dyn StatusSource>,
    store: Arc<dyn HistoryStore>,
    rules: Vec<upsentry::models::AlertRule>,
) -> Harness {
    let mail = Arc::new(RecordingMailTransport::default());
    let dispatcher = Arc::new(Dispatcher::new(
        vec![email_channel("mail", &["oncall@example.com"])],
        WebhookService::default(),
        EmailService::new(mail.clone()),
        SmsService::new(Arc::new(RecordingSmsGateway::default())),
    ));
    let engine = RuleEngine::new(&rules, &HealthReportSettings::default()).unwrap();
    let live = Arc::new(RwLock::new(LiveStatus::default()));

    let monitor = Monitor::new(
        source,
        engine,
        dispatcher,
        store,
        live.clone(),
        Duration::from_secs(5),
        Duration::from_millis(10),
    );

    Harness { monitor, live, mail }
}

fn exit_failure() -> PollError {
    PollError::NonZeroExit {
        code: Some(1),
        stderr: "Error: Driver not connected".to_string(),
    }
}

#[tokio::test]
async fn test_three_failed_polls_fire_one_connectivity_alert() {
    let store = Arc::new(InMemoryHistoryStore::new(100));
    let mut h = harness(
        Arc::new(ScriptedStatusSource::default()),
        store.clone(),
        vec![],
    );

    for offset in [0, 60, 120] {
        let outcome = h.monitor.process(Err(exit_failure()), at(offset)).await;
        assert_eq!(outcome, CycleOutcome::PollFailed);
        assert!(outcome.needs_backoff());
    }

    let alerts = store.recent_alerts(10).await.unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].rule_kind, RuleKind::Connectivity);

    let deliveries = store.recent_deliveries(10).await.unwrap();
    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].alert_event_id, Some(alerts[0].id));
    assert_eq!(h.mail.sent().len(), 1);

    let live = h.live.read().await;
    assert!(!live.connected);
    assert!(live.error.as_deref().unwrap().contains("Driver not connected"));
    assert_eq!(live.last_poll_attempt, Some(at(120)));
}

#[tokio::test]
async fn test_failed_poll_keeps_last_good_snapshot() {
    let store = Arc::new(InMemoryHistoryStore::new(100));
    let mut h = harness(
        Arc::new(ScriptedStatusSource::default()),
        store.clone(),
        vec![],
    );

    let good = snapshot_at(at(0), LineState::OnLine, Some(100.0));
    assert_eq!(
        h.monitor.process(Ok(good.clone()), at(0)).await,
        CycleOutcome::Completed
    );
    h.monitor.process(Err(PollError::Timeout(10)), at(60)).await;

    let live = h.live.read().await;
    assert!(!live.connected);
    assert_eq!(live.snapshot.as_ref(), Some(&good));
    assert_eq!(live.last_successful_poll, Some(at(0)));
}

#[tokio::test]
async fn test_store_failure_keeps_cycle_until_written() {
    let store = Arc::new(FailingStore::new());
    let mut h = harness(
        Arc::new(ScriptedStatusSource::default()),
        store.clone(),
        vec![rule(
            "电量骤变",
            RuleCondition::BatteryDelta { min_change: 10.0 },
            None,
        )],
    );

    store.set_failing(false);
    let first = snapshot_at(at(0), LineState::OnBattery, Some(60.0));
    assert_eq!(h.monitor.process(Ok(first.clone()), at(0)).await, CycleOutcome::Completed);

    store.set_failing(true);
    let second = snapshot_at(at(60), LineState::OnBattery, Some(45.0));
    assert_eq!(
        h.monitor.process(Ok(second.clone()), at(60)).await,
        CycleOutcome::StoreFailed
    );
    assert_eq!(h.monitor.previous(), Some(&first));
    assert_eq!(h.monitor.pending_cycles(), 1);
    assert_eq!(h.mail.sent().len(), 1);

    {
        let live = h.live.read().await;
        assert!(live.connected);
        assert!(live.error.as_deref().unwrap().contains("存储不可用"));
        assert_eq!(live.snapshot.as_ref(), Some(&first));
        assert_eq!(live.last_poll_attempt, Some(at(60)));
    }

    // 存储恢复后先补写积压周期，再与其快照比较，不会重复触发
    store.set_failing(false);
    let third = snapshot_at(at(120), LineState::OnBattery, Some(48.0));
    assert_eq!(h.monitor.process(Ok(third.clone()), at(120)).await, CycleOutcome::Completed);
    assert_eq!(h.monitor.previous(), Some(&third));
    assert_eq!(h.monitor.pending_cycles(), 0);
    assert!(h.live.read().await.error.is_none());

    let alerts = store.recent_alerts(10).await.unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].rule_kind, RuleKind::BatteryDelta);
    assert_eq!(alerts[0].value, Some(15.0));

    // 每封已发出的邮件都有对应的投递记录
    let deliveries = store.recent_deliveries(10).await.unwrap();
    assert_eq!(h.mail.sent().len(), deliveries.len());
    assert_eq!(deliveries[0].alert_event_id, Some(alerts[0].id));

    let history = store.recent_status(10).await.unwrap();
    assert_eq!(history, vec![third, second, first]);
}

#[tokio::test]
async fn test_connectivity_delivery_written_after_store_recovers() {
    let store = Arc::new(FailingStore::new());
    let mut h = harness(
        Arc::new(ScriptedStatusSource::default()),
        store.clone(),
        vec![],
    );

    assert_eq!(
        h.monitor.process(Err(exit_failure()), at(0)).await,
        CycleOutcome::PollFailed
    );
    assert_eq!(h.monitor.pending_cycles(), 1);
    assert_eq!(h.mail.sent().len(), 1);

    store.set_failing(false);
    let good = snapshot_at(at(60), LineState::OnLine, Some(100.0));
    assert_eq!(h.monitor.process(Ok(good), at(60)).await, CycleOutcome::Completed);
    assert_eq!(h.monitor.pending_cycles(), 0);

    let alerts = store.recent_alerts(10).await.unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].rule_kind, RuleKind::Connectivity);
    assert_eq!(store.recent_deliveries(10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_snapshot_round_trip_through_store() {
    let store = Arc::new(InMemoryHistoryStore::new(100));
    let mut h = harness(
        Arc::new(ScriptedStatusSource::default()),
        store.clone(),
        vec![],
    );

    let mut polled = snapshot(LineState::OnLine, Some(87.5));
    polled.runtime_s = Some(1800);
    polled.load_pct = Some(23.0);
    polled.input_v = Some(229.5);
    polled
        .extra
        .insert("ups.model".to_string(), "Back-UPS 700".to_string());

    h.monitor.process(Ok(polled.clone()), at(0)).await;

    let latest: Option<StatusSnapshot> = store.latest_status().await.unwrap();
    assert_eq!(latest, Some(polled));
}

#[tokio::test]
async fn test_run_cycle_polls_source() {
    let source = Arc::new(ScriptedStatusSource::new(vec![Ok(snapshot(
        LineState::OnLine,
        Some(100.0),
    ))]));
    let store = Arc::new(InMemoryHistoryStore::new(100));
    let mut h = harness(source.clone(), store.clone(), vec![]);

    assert_eq!(h.monitor.run_cycle().await, CycleOutcome::Completed);
    assert_eq!(h.live.read().await.state, MonitorState::Idle);

    // 预设结果耗尽后返回错误
    assert_eq!(h.monitor.run_cycle().await, CycleOutcome::PollFailed);
    assert_eq!(h.live.read().await.state, MonitorState::Backoff);
    assert_eq!(source.polls(), 2);
    assert_eq!(store.recent_status(10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_run_stops_on_cancel() {
    let source = Arc::new(ScriptedStatusSource::new(vec![Ok(snapshot(
        LineState::OnLine,
        Some(100.0),
    ))]));
    let store = Arc::new(InMemoryHistoryStore::new(100));
    let h = harness(source.clone(), store.clone(), vec![]);
    let live = h.live.clone();

    let cancel = CancellationToken::new();
    let handle = tokio::spawn(h.monitor.run(cancel.clone()));

    // 第一次 tick 立即触发
    for _ in 0..100 {
        if source.polls() > 0 && store.latest_status().await.unwrap().is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cancel.cancel();
    handle.await.unwrap();

    assert_eq!(source.polls(), 1);
    assert_eq!(live.read().await.state, MonitorState::Stopped);
    assert!(live.read().await.connected);
}
