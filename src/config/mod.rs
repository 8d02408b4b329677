//! 配置模块

mod settings;
mod validation;

pub use settings::*;
