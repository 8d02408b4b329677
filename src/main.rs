//! upsentry - UPS 监控与预警服务

use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use upsentry::{
    config::{LoggingSettings, Settings},
    db::PostgresPool,
    middleware::OperatorAuth,
    models::LiveStatus,
    repositories::{HistoryStore, InMemoryHistoryStore, PgHistoryStore},
    routes,
    services::{run_retention, CommandStatusSource, Dispatcher, Monitor, RuleEngine, StatusService},
};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // 加载环境变量
    dotenvy::dotenv().ok();

    // 加载配置
    let settings = Settings::load().context("配置加载失败")?;

    // 初始化日志
    init_tracing(&settings.logging);

    info!("upsentry 服务启动中...");

    // 配置错误直接拒绝启动
    settings.validate_monitoring()?;
    info!(
        rules = settings.rules.len(),
        channels = settings.channels.len(),
        "配置加载完成"
    );

    // 历史存储
    let store: Arc<dyn HistoryStore> = match Settings::database_url() {
        Some(url) => {
            let pool = PostgresPool::new(&settings, &url).await?;
            info!("数据库连接成功");
            Arc::new(PgHistoryStore::new(pool))
        }
        None => {
            tracing::warn!(
                capacity = settings.history.memory_capacity,
                "未配置 DATABASE_URL，使用内存存储，重启后历史数据丢失"
            );
            Arc::new(InMemoryHistoryStore::new(settings.history.memory_capacity))
        }
    };

    // 初始化服务
    let engine = RuleEngine::new(&settings.rules, &settings.health_report)?;
    let dispatcher = Arc::new(Dispatcher::from_channels(settings.channels.clone()));
    let source = Arc::new(CommandStatusSource::from_settings(&settings.ups));
    let live = Arc::new(RwLock::new(LiveStatus::default()));
    let status_service = Arc::new(StatusService::new(
        live.clone(),
        store.clone(),
        dispatcher.clone(),
    ));

    let operator_auth = OperatorAuth::new(Settings::operator_key());
    if !operator_auth.is_enabled() {
        tracing::warn!("未配置操作员密钥，写接口不做认证");
    }

    // 启动后台任务
    let cancel = CancellationToken::new();
    let monitor = Monitor::new(
        source,
        engine,
        dispatcher,
        store.clone(),
        live,
        settings.poll_interval(),
        Duration::from_secs(settings.ups.backoff_seconds),
    );
    let monitor_handle = tokio::spawn(monitor.run(cancel.clone()));
    let retention_handle = tokio::spawn(run_retention(
        store,
        settings.history.retention_days,
        Duration::from_secs(settings.history.purge_interval_seconds),
        cancel.clone(),
    ));

    let server_addr = settings.server_addr();
    let workers = if settings.server.workers == 0 {
        num_cpus::get()
    } else {
        settings.server.workers
    };

    info!(addr = %server_addr, workers, "HTTP 服务启动");

    // 启动 HTTP 服务器，收到停止信号后返回
    let server_result = HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allowed_methods(vec!["GET", "POST"])
            .allowed_headers(vec!["Content-Type", "X-API-Key"])
            .max_age(3600);

        App::new()
            // 全局中间件
            .wrap(cors)
            .wrap(TracingLogger::default())
            .wrap(middleware::Compress::default())
            // 注入服务
            .app_data(web::Data::new(status_service.clone()))
            // 配置 HTTP 路由
            .configure(|cfg| routes::configure(cfg, operator_auth.clone()))
    })
    .workers(workers)
    .bind(&server_addr)?
    .run()
    .await;

    info!("HTTP 服务已停止，等待后台任务退出");
    cancel.cancel();
    if let Err(e) = monitor_handle.await {
        tracing::error!(error = %e, "监控任务异常退出");
    }
    if let Err(e) = retention_handle.await {
        tracing::error!(error = %e, "清理任务异常退出");
    }

    server_result?;
    info!("upsentry 已退出");
    Ok(())
}

/// 初始化日志系统
fn init_tracing(logging: &LoggingSettings) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("{},upsentry=debug", logging.level))
    });

    let registry = tracing_subscriber::registry().with(env_filter);
    if logging.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .init();
    }
}
