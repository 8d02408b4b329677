//! 通知 API 处理器

use crate::errors::AppError;
use crate::models::{ApiResponse, DeliveryListQuery};
use crate::services::StatusService;
use actix_web::{web, HttpResponse};
use std::sync::Arc;
use validator::Validate;

/// 查询投递记录
pub async fn list_deliveries(
    status_service: web::Data<Arc<StatusService>>,
    query: web::Query<DeliveryListQuery>,
) -> Result<HttpResponse, AppError> {
    query.validate()?;

    let deliveries = status_service.deliveries(query.limit).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(deliveries)))
}

/// 发送测试通知，`{channel}` 可以是渠道名称或类型
pub async fn test_notification(
    status_service: web::Data<Arc<StatusService>>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let result = status_service.test_notification(&path.into_inner()).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(result)))
}
