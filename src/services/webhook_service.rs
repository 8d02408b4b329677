//! Webhook 通知发送

use crate::errors::NotifyError;
use crate::models::{Notification, SendOutcome, WebhookConfig};
use reqwest::{Client, Method};

/// Webhook 发送服务
#[derive(Clone, Default)]
pub struct WebhookService {
    client: Client,
}

impl WebhookService {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// 按配置的方法和请求头发送 JSON 负载，2xx 视为成功
    ///
    /// 超时由分发器按渠道的 `timeout_seconds` 控制。
    pub async fn send(
        &self,
        config: &WebhookConfig,
        notification: &Notification,
    ) -> Result<SendOutcome, NotifyError> {
        let method = Method::from_bytes(config.method.to_uppercase().as_bytes())
            .map_err(|_| NotifyError::InvalidConfig(format!("HTTP 方法无效: {}", config.method)))?;

        let mut request = self
            .client
            .request(method, &config.url)
            .json(&notification.webhook_payload());

        for (name, value) in &config.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await?;
        let status = response.status();

        if status.is_success() {
            tracing::debug!(url = %config.url, status = status.as_u16(), "Webhook 发送成功");
            Ok(SendOutcome {
                response_code: Some(i32::from(status.as_u16())),
            })
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(NotifyError::Status {
                code: status.as_u16(),
                body: body.chars().take(200).collect(),
            })
        }
    }
}
