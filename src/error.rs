//! 统一错误处理模型
//!
//! 提供主应用 spotgazer 的顶层错误类型，聚合配置、后端接口与任务调度的错误

use spotgazer_api::ApiError;
use spotgazer_common::ConfigError;
use thiserror::Error;

/// 主应用的统一错误枚举
#[derive(Debug, Error)]
pub enum Error {
    // ========== 配置相关错误 ==========
    /// 配置文件或环境变量错误
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    // ========== 后端相关错误 ==========
    /// 认证或 HTTP 请求错误
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// 发现接口没有返回任何停车场
    #[error("No video stream sources available")]
    NoSourcesAvailable,

    // ========== 系统级错误 ==========
    /// I/O 操作错误
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// 任务调度错误
    #[error("Task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    // ========== 监督相关错误 ==========
    /// 连续异常退出次数耗尽
    #[error("Detection session failed {attempts} times, giving up")]
    RetriesExhausted { attempts: u32 },

    // ========== 通用错误 ==========
    /// 自定义错误消息
    #[error("Application error: {message}")]
    Custom { message: String },
}

/// 统一的 Result 类型
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// 创建自定义错误
    pub fn custom(message: impl Into<String>) -> Self {
        Self::Custom {
            message: message.into(),
        }
    }

    /// 该错误是否使整个会话失效（需要由 Supervisor 重启）
    pub fn is_session_fatal(&self) -> bool {
        match self {
            Error::Api(e) => e.is_session_fatal(),
            Error::NoSourcesAvailable => true,
            _ => false,
        }
    }
}
