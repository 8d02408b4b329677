//! 错误类型模块

mod app_error;
mod notify_error;

pub use app_error::AppError;
pub use notify_error::{merge_recipient_results, NotifyError};
