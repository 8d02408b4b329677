//! 路由配置模块

use crate::handlers;
use crate::middleware::OperatorAuth;
use actix_web::web;

/// 配置所有路由
///
/// 写接口由操作员密钥保护
pub fn configure(cfg: &mut web::ServiceConfig, operator_auth: OperatorAuth) {
    cfg
        // 健康检查路由（公开）
        .service(
            web::scope("/health")
                .route("", web::get().to(handlers::health))
                .route("/ready", web::get().to(handlers::ready))
                .route("/live", web::get().to(handlers::live)),
        )
        .service(
            web::scope("/api/v1")
                .service(
                    web::scope("/status")
                        .route("", web::get().to(handlers::get_status))
                        .route("/history", web::get().to(handlers::get_status_history)),
                )
                .service(
                    web::scope("/alerts")
                        .route("", web::get().to(handlers::list_alerts))
                        .service(
                            web::resource("/{id}/acknowledge")
                                .wrap(operator_auth.clone())
                                .route(web::post().to(handlers::acknowledge_alert)),
                        ),
                )
                .route("/deliveries", web::get().to(handlers::list_deliveries))
                .service(
                    web::scope("/notifications")
                        .wrap(operator_auth)
                        .route("/test/{channel}", web::post().to(handlers::test_notification)),
                ),
        );
}
