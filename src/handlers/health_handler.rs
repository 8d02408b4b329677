//! 健康检查 API 处理器

use crate::models::{HealthCheckResponse, ServiceStatus};
use crate::services::StatusService;
use actix_web::{web, HttpResponse};
use std::sync::Arc;
use std::time::Instant;

/// 应用启动时间
static START_TIME: once_cell::sync::Lazy<Instant> = once_cell::sync::Lazy::new(Instant::now);

/// 详细健康检查
pub async fn health(status_service: web::Data<Arc<StatusService>>) -> HttpResponse {
    let start = Instant::now();
    let storage = match status_service.store().health_check().await {
        Ok(_) => ServiceStatus::healthy(start.elapsed().as_millis() as u64),
        Err(_) => ServiceStatus::unhealthy(),
    };
    let ups_connected = status_service.is_connected().await;

    let response = HealthCheckResponse {
        status: if storage.is_healthy() && ups_connected {
            "healthy".to_string()
        } else {
            "degraded".to_string()
        },
        version: env!("CARGO_PKG_VERSION").to_string(),
        storage,
        ups_connected,
        uptime_seconds: START_TIME.elapsed().as_secs(),
    };

    HttpResponse::Ok().json(response)
}

/// 就绪检查：存储可用即就绪
pub async fn ready(status_service: web::Data<Arc<StatusService>>) -> HttpResponse {
    if status_service.store().health_check().await.is_ok() {
        HttpResponse::Ok().json(serde_json::json!({
            "ready": true
        }))
    } else {
        HttpResponse::ServiceUnavailable().json(serde_json::json!({
            "ready": false,
            "storage": false
        }))
    }
}

/// 存活检查
pub async fn live() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "alive": true
    }))
}
