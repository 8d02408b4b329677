//! 预警 API 处理器

use crate::errors::AppError;
use crate::models::{AlertListQuery, ApiResponse};
use crate::services::StatusService;
use actix_web::{web, HttpResponse};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

/// 查询预警事件列表
pub async fn list_alerts(
    status_service: web::Data<Arc<StatusService>>,
    query: web::Query<AlertListQuery>,
) -> Result<HttpResponse, AppError> {
    query.validate()?;

    let alerts = status_service.alerts(query.limit).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(alerts)))
}

/// 确认预警
pub async fn acknowledge_alert(
    status_service: web::Data<Arc<StatusService>>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let event = status_service.acknowledge(path.into_inner()).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(event)))
}
