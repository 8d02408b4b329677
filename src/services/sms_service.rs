//! 短信通知发送

use crate::errors::{merge_recipient_results, NotifyError};
use crate::models::{Notification, SendOutcome, SmsConfig};
use reqwest::Client;
use secrecy::ExposeSecret;
use std::sync::Arc;
use std::time::Duration;

const TWILIO_API_BASE: &str = "https://api.twilio.com";

/// 短信网关
#[async_trait::async_trait]
pub trait SmsGateway: Send + Sync {
    /// 向单个号码发送一条短信
    async fn send_sms(
        &self,
        config: &SmsConfig,
        to: &str,
        body: &str,
    ) -> Result<SendOutcome, NotifyError>;
}

/// Twilio 短信网关
#[derive(Clone, Default)]
pub struct TwilioGateway {
    client: Client,
}

impl TwilioGateway {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn messages_url(config: &SmsConfig) -> String {
        let base = config
            .api_base
            .as_deref()
            .unwrap_or(TWILIO_API_BASE)
            .trim_end_matches('/');
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            base, config.account_sid
        )
    }
}

#[async_trait::async_trait]
impl SmsGateway for TwilioGateway {
    async fn send_sms(
        &self,
        config: &SmsConfig,
        to: &str,
        body: &str,
    ) -> Result<SendOutcome, NotifyError> {
        let params = [("To", to), ("From", config.from_number.as_str()), ("Body", body)];
        let response = self
            .client
            .post(Self::messages_url(config))
            .basic_auth(&config.account_sid, Some(config.auth_token.expose_secret()))
            .timeout(Duration::from_secs(config.timeout_seconds))
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            // 已受理的消息也可能直接标记为 failed
            let message: serde_json::Value = response.json().await.unwrap_or_default();
            if let Some(state @ ("failed" | "undelivered")) =
                message.get("status").and_then(|v| v.as_str())
            {
                let reason = message
                    .get("error_message")
                    .and_then(|v| v.as_str())
                    .unwrap_or(state);
                return Err(NotifyError::Sms(reason.to_string()));
            }

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

/// 短信服务
#[derive(Clone)]
pub struct SmsService {
    gateway: Arc<dyn SmsGateway>,
}

impl Default for SmsService {
    fn default() -> Self {
        Self::new(Arc::new(TwilioGateway::default()))
    }
}

impl SmsService {
    pub fn new(gateway: Arc<dyn SmsGateway>) -> Self {
        Self { gateway }
    }

    /// 逐个号码发送短信
    pub async fn send(
        &self,
        config: &SmsConfig,
        notification: &Notification,
    ) -> Result<SendOutcome, NotifyError> {
        let text = notification.sms_text();
        let timeout = Duration::from_secs(config.timeout_seconds);
        let mut results = Vec::with_capacity(config.recipients.len());

        for recipient in &config.recipients {
            let result = match tokio::time::timeout(
                timeout,
                self.gateway.send_sms(config, recipient, &text),
            )
            .await
            {
                Ok(sent) => sent,
                Err(_) => Err(NotifyError::Timeout(config.timeout_seconds)),
            };
            if let Err(e) = &result {
                tracing::warn!(to = %recipient, error = %e, "短信发送失败");
            }
            results.push((recipient.clone(), result));
        }

        merge_recipient_results(results)
    }
}
