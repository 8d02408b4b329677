//! HTTP 处理器模块

mod alert_handler;
mod health_handler;
mod notification_handler;
mod status_handler;

pub use alert_handler::*;
pub use health_handler::*;
pub use notification_handler::*;
pub use status_handler::*;
