//! 错误处理模块
//!
//! 基础库只承载配置相关的错误，其余错误由各自的 crate 定义

mod config_error;

pub use config_error::ConfigError;

/// 统一的 Result 类型
pub type Result<T> = std::result::Result<T, ConfigError>;
