//! 数据模型模块

mod alert;
mod common;
mod monitor;
mod notification;
mod status;

pub use alert::*;
pub use common::*;
pub use monitor::*;
pub use notification::*;
pub use status::*;
