//! UPS 状态 API 处理器

use crate::errors::AppError;
use crate::models::{ApiResponse, HistoryQuery};
use crate::services::StatusService;
use actix_web::{web, HttpResponse};
use std::sync::Arc;
use validator::Validate;

/// 获取当前状态
pub async fn get_status(
    status_service: web::Data<Arc<StatusService>>,
) -> Result<HttpResponse, AppError> {
    let status = status_service.current_status().await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(status)))
}

/// 查询状态历史（最新在前）
pub async fn get_status_history(
    status_service: web::Data<Arc<StatusService>>,
    query: web::Query<HistoryQuery>,
) -> Result<HttpResponse, AppError> {
    query.validate()?;

    let history = status_service.history(query.limit).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(history)))
}
