//! 操作员认证中间件
//!
//! 写接口（确认预警、发送测试通知）要求请求头 `X-API-Key` 与配置的操作员密钥一致。
//! 未配置密钥时不做校验。

use crate::errors::AppError;
use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, ResponseError,
};
use futures::future::{ok, LocalBoxFuture, Ready};
use ring::constant_time;
use secrecy::{ExposeSecret, SecretString};
use std::rc::Rc;
use std::sync::Arc;

pub const API_KEY_HEADER: &str = "X-API-Key";

/// 操作员密钥认证
#[derive(Clone, Default)]
pub struct OperatorAuth {
    key: Option<Arc<SecretString>>,
}

impl OperatorAuth {
    pub fn new(key: Option<SecretString>) -> Self {
        Self {
            key: key.map(Arc::new),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.key.is_some()
    }
}

/// 校验请求携带的密钥：缺失返回 401，不匹配返回 403
pub fn check_operator_key(provided: Option<&str>, expected: &SecretString) -> Result<(), AppError> {
    let provided =
        provided.ok_or_else(|| AppError::Unauthorized("缺少操作员密钥".to_string()))?;

    constant_time::verify_slices_are_equal(
        provided.as_bytes(),
        expected.expose_secret().as_bytes(),
    )
    .map_err(|_| AppError::Forbidden("操作员密钥无效".to_string()))
}

impl<S, B> Transform<S, ServiceRequest> for OperatorAuth
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = OperatorAuthMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(OperatorAuthMiddleware {
            service: Rc::new(service),
            key: self.key.clone(),
        })
    }
}

pub struct OperatorAuthMiddleware<S> {
    service: Rc<S>,
    key: Option<Arc<SecretString>>,
}

impl<S, B> Service<ServiceRequest> for OperatorAuthMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let key = self.key.clone();

        Box::pin(async move {
            if let Some(expected) = key {
                let provided = req
                    .headers()
                    .get(API_KEY_HEADER)
                    .and_then(|h| h.to_str().ok());

                if let Err(e) = check_operator_key(provided, &expected) {
                    tracing::warn!(path = %req.path(), error = %e, "操作员认证失败");
                    let response = e.error_response();
                    return Ok(req.into_response(response).map_into_right_body());
                }
            }

            service
                .call(req)
                .await
                .map(ServiceResponse::map_into_left_body)
        })
    }
}
