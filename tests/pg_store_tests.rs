//! PostgreSQL 历史存储集成测试
//!
//! 需要 `DATABASE_URL` 指向可创建测试库的 PostgreSQL 实例。

mod helpers;

use helpers::{at, snapshot_at};
use sqlx::PgPool;
use upsentry::db::PostgresPool;
use upsentry::errors::AppError;
use upsentry::models::{
    AlertEvent, AlertLevel, ChannelType, DeliveryRecord, LineState, RuleKind, StatusSnapshot,
};
use upsentry::repositories::{CycleRecord, HistoryStore, PgHistoryStore};
use uuid::Uuid;

fn store(pool: PgPool) -> PgHistoryStore {
    PgHistoryStore::new(PostgresPool::from_pool(pool))
}

fn full_snapshot(offset: i64) -> StatusSnapshot {
    let mut s = snapshot_at(at(offset), LineState::LowBattery, Some(9.5));
    s.runtime_s = Some(4_000_000_000);
    s.load_pct = Some(41.0);
    s.input_v = Some(0.0);
    s.output_v = Some(230.1);
    s.battery_v = Some(12.2);
    s.temperature_c = Some(-3.5);
    s.bad_packs = Some(1);
    s.extra
        .insert("ups.model".to_string(), "Back-UPS XS 1500G".to_string());
    s.extra.insert("ups.serial".to_string(), "4B1234P56789".to_string());
    s
}

fn event(kind: RuleKind, level: AlertLevel, offset: i64) -> AlertEvent {
    AlertEvent::new(
        "测试规则",
        kind,
        level,
        format!("{} 触发", kind),
        Some(12.0),
        Some(10.0),
        at(offset),
    )
}

fn delivery(
    alert_event_id: Option<Uuid>,
    channel_type: ChannelType,
    success: bool,
    offset: i64,
) -> DeliveryRecord {
    DeliveryRecord {
        id: Uuid::new_v4(),
        alert_event_id,
        channel_name: format!("{}-channel", channel_type),
        channel_type,
        target: "ops@example.com".to_string(),
        success,
        response_code: if success { Some(250) } else { None },
        error_message: if success { None } else { Some("连接被拒绝".to_string()) },
        is_test: alert_event_id.is_none(),
        attempted_at: at(offset),
    }
}

#[sqlx::test(migrations = "./migrations")]
async fn test_snapshot_round_trip(pool: PgPool) {
    let store = store(pool);
    assert_eq!(store.latest_status().await.unwrap(), None);

    let full = full_snapshot(0);
    store.append_status(&full).await.unwrap();
    assert_eq!(store.latest_status().await.unwrap(), Some(full.clone()));

    // 每种线路状态都能往返
    let states = [LineState::OnLine, LineState::OnBattery, LineState::Unknown];
    for (i, state) in states.iter().enumerate() {
        let s = snapshot_at(at(60 * (i as i64 + 1)), *state, None);
        store.append_status(&s).await.unwrap();
    }

    let recent = store.recent_status(10).await.unwrap();
    assert_eq!(recent.len(), 4);
    assert_eq!(recent[0].line_state, LineState::Unknown);
    assert_eq!(recent[1].line_state, LineState::OnBattery);
    assert_eq!(recent[2].line_state, LineState::OnLine);
    assert_eq!(recent[3], full);
    assert!(recent[0].extra.is_empty());

    assert_eq!(store.recent_status(2).await.unwrap().len(), 2);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_alert_kinds_and_levels(pool: PgPool) {
    let store = store(pool);
    let events = vec![
        event(RuleKind::BatteryLevel, AlertLevel::Critical, 0),
        event(RuleKind::InputVoltage, AlertLevel::Warning, 10),
        event(RuleKind::RuntimeDelta, AlertLevel::Warning, 20),
        event(RuleKind::Connectivity, AlertLevel::Critical, 30),
        event(RuleKind::HealthReport, AlertLevel::Info, 40),
    ];
    store.append_alerts(&events).await.unwrap();

    let stored = store.recent_alerts(10).await.unwrap();
    let expected: Vec<AlertEvent> = events.into_iter().rev().collect();
    assert_eq!(stored, expected);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_acknowledge_keeps_first_resolved_at(pool: PgPool) {
    let store = store(pool);
    let alert = event(RuleKind::LineStatus, AlertLevel::Warning, 0);
    store.append_alerts(&[alert.clone()]).await.unwrap();

    let resolved = store.resolve_alert(alert.id, at(100)).await.unwrap();
    assert!(resolved.resolved);
    assert_eq!(resolved.resolved_at, Some(at(100)));

    let again = store.resolve_alert(alert.id, at(200)).await.unwrap();
    assert!(again.resolved);
    assert_eq!(again.resolved_at, Some(at(100)));

    let err = store.resolve_alert(Uuid::new_v4(), at(300)).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[sqlx::test(migrations = "./migrations")]
async fn test_record_cycle_writes_everything(pool: PgPool) {
    let store = store(pool);
    let alert = event(RuleKind::BatteryDelta, AlertLevel::Warning, 0);
    let cycle = CycleRecord {
        snapshot: Some(full_snapshot(0)),
        events: vec![alert.clone()],
        deliveries: vec![
            delivery(Some(alert.id), ChannelType::Webhook, false, 1),
            delivery(Some(alert.id), ChannelType::Email, true, 2),
            delivery(Some(alert.id), ChannelType::Sms, true, 3),
        ],
    };

    store.record_cycle(&cycle).await.unwrap();

    assert_eq!(store.latest_status().await.unwrap(), cycle.snapshot);
    assert_eq!(store.recent_alerts(10).await.unwrap(), vec![alert]);

    let deliveries = store.recent_deliveries(10).await.unwrap();
    let expected: Vec<DeliveryRecord> = cycle.deliveries.iter().rev().cloned().collect();
    assert_eq!(deliveries, expected);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_record_cycle_rolls_back_on_failure(pool: PgPool) {
    let store = store(pool);
    let alert = event(RuleKind::Runtime, AlertLevel::Warning, 0);

    // 投递记录引用不存在的事件，外键约束使整个事务失败
    let cycle = CycleRecord {
        snapshot: Some(full_snapshot(0)),
        events: vec![alert],
        deliveries: vec![delivery(Some(Uuid::new_v4()), ChannelType::Email, true, 1)],
    };

    assert!(store.record_cycle(&cycle).await.is_err());
    assert_eq!(store.latest_status().await.unwrap(), None);
    assert!(store.recent_alerts(10).await.unwrap().is_empty());
    assert!(store.recent_deliveries(10).await.unwrap().is_empty());
}

#[sqlx::test(migrations = "./migrations")]
async fn test_test_delivery_without_event(pool: PgPool) {
    let store = store(pool);
    let record = delivery(None, ChannelType::Webhook, true, 0);
    store.append_deliveries(&[record.clone()]).await.unwrap();

    let stored = store.recent_deliveries(10).await.unwrap();
    assert_eq!(stored, vec![record]);
    assert!(stored[0].is_test);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_purge_and_health(pool: PgPool) {
    let store = store(pool);
    for offset in [0, 3_600, 7_200] {
        store
            .append_status(&snapshot_at(at(offset), LineState::OnLine, Some(100.0)))
            .await
            .unwrap();
    }

    assert_eq!(store.purge_status_before(at(3_600)).await.unwrap(), 1);
    assert_eq!(store.purge_status_before(at(3_600)).await.unwrap(), 0);

    let remaining = store.recent_status(10).await.unwrap();
    assert_eq!(remaining.len(), 2);
    assert_eq!(remaining[1].timestamp, at(3_600));

    assert!(store.health_check().await.is_ok());
}
