//! upsentry - UPS 监控与预警服务
//!
//! 通过状态命令定时轮询 UPS，支持：
//! - 状态历史记录与保留期清理
//! - 阈值、变化量与线路状态预警
//! - Webhook / 邮件 / 短信通知
//! - 只读查询 API 与测试通知

pub mod config;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod repositories;
pub mod routes;
pub mod services;

pub use errors::AppError;
