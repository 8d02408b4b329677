//! 邮件服务模块
//!
//! 通过 SMTP 发送纯文本通知邮件。每个收件人单独发送一封，
//! 单个地址出错不影响其他收件人。

use crate::errors::{merge_recipient_results, NotifyError};
use crate::models::{EmailConfig, Notification, SendOutcome};
use lettre::{
    message::Mailbox, transport::smtp::authentication::Credentials, AsyncSmtpTransport,
    AsyncTransport, Message, Tokio1Executor,
};
use secrecy::ExposeSecret;
use std::sync::Arc;
use std::time::Duration;

/// 邮件传输层
#[async_trait::async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, config: &EmailConfig, message: Message) -> Result<(), NotifyError>;
}

/// 基于 lettre 的 SMTP 传输
#[derive(Debug, Clone, Default)]
pub struct SmtpMailTransport;

impl SmtpMailTransport {
    fn build(config: &EmailConfig) -> Result<AsyncSmtpTransport<Tokio1Executor>, NotifyError> {
        let timeout = Some(Duration::from_secs(config.timeout_seconds));

        let builder = if config.use_tls {
            // 465 端口使用隐式 TLS，其余端口使用 STARTTLS
            let relay = if config.smtp_port == 465 {
                AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
            } else {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            };
            relay.map_err(|e| NotifyError::InvalidConfig(format!("SMTP 配置错误: {}", e)))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_host)
        };
        let mut builder = builder.port(config.smtp_port).timeout(timeout);

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(
                username.clone(),
                password.expose_secret().clone(),
            ));
        }

        Ok(builder.build())
    }
}

#[async_trait::async_trait]
impl MailTransport for SmtpMailTransport {
    async fn send(&self, config: &EmailConfig, message: Message) -> Result<(), NotifyError> {
        let mailer = Self::build(config)?;
        mailer
            .send(message)
            .await
            .map(|_| ())
            .map_err(|e| NotifyError::Mail(e.to_string()))
    }
}

/// 邮件服务
#[derive(Clone)]
pub struct EmailService {
    transport: Arc<dyn MailTransport>,
}

impl Default for EmailService {
    fn default() -> Self {
        Self::new(Arc::new(SmtpMailTransport))
    }
}

impl EmailService {
    pub fn new(transport: Arc<dyn MailTransport>) -> Self {
        Self { transport }
    }

    /// 逐个收件人发送通知邮件
    pub async fn send(
        &self,
        config: &EmailConfig,
        notification: &Notification,
    ) -> Result<SendOutcome, NotifyError> {
        let from: Mailbox = config
            .from_address
            .parse()
            .map_err(|e| NotifyError::InvalidConfig(format!("发件人地址无效: {}", e)))?;
        let subject = notification.email_subject();
        let body = notification.plain_text();

        let timeout = Duration::from_secs(config.timeout_seconds);
        let mut results = Vec::with_capacity(config.recipients.len());
        for recipient in &config.recipients {
            let result = match build_message(&from, recipient, &subject, &body) {
                Ok(message) => {
                    match tokio::time::timeout(timeout, self.transport.send(config, message)).await
                    {
                        Ok(sent) => sent.map(|_| SendOutcome::default()),
                        Err(_) => Err(NotifyError::Timeout(config.timeout_seconds)),
                    }
                }
                Err(e) => Err(e),
            };

            if let Err(e) = &result {
                tracing::warn!(to = %recipient, error = %e, "邮件发送失败");
            } else {
                tracing::debug!(to = %recipient, "邮件已发送");
            }
            results.push((recipient.clone(), result));
        }

        merge_recipient_results(results)
    }
}

fn build_message(
    from: &Mailbox,
    to: &str,
    subject: &str,
    body: &str,
) -> Result<Message, NotifyError> {
    let to: Mailbox = to
        .parse()
        .map_err(|e| NotifyError::InvalidConfig(format!("收件人地址无效: {}", e)))?;

    Message::builder()
        .from(from.clone())
        .to(to)
        .subject(subject)
        .body(body.to_string())
        .map_err(|e| NotifyError::Mail(format!("邮件构建失败: {}", e)))
}
