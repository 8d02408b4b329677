//! 业务逻辑层（Service）

mod dispatch_service;
mod email_service;
mod monitor_service;
mod rule_engine;
mod sms_service;
mod status_service;
mod status_source;
mod webhook_service;

pub use dispatch_service::Dispatcher;
pub use email_service::{EmailService, MailTransport, SmtpMailTransport};
pub use monitor_service::{run_retention, CycleOutcome, Monitor};
pub use rule_engine::{
    classify_transition, LastFired, RuleEngine, Transition, DEFAULT_CONNECTIVITY_INTERVAL_SECONDS,
};
pub use sms_service::{SmsGateway, SmsService, TwilioGateway};
pub use status_service::StatusService;
pub use status_source::{parse_status, CommandStatusSource, PollError, StatusSource};
pub use webhook_service::WebhookService;
