//! API 客户端错误类型

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    /// 登录或刷新令牌失败
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// 令牌载荷无法解码，属于契约错误
    #[error("Malformed token: {0}")]
    TokenDecode(String),

    #[error("HTTP error {status} from {url}: {body}")]
    Http {
        status: u16,
        url: String,
        body: String,
    },

    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Client session closed")]
    Closed,
}

impl ApiError {
    /// 是否应当终止整个会话（交给监督循环处理），而不是在单个停车场内恢复
    ///
    /// 普通请求的 HTTP 错误（包括重试后仍为 401）只影响当前操作。
    pub fn is_session_fatal(&self) -> bool {
        matches!(
            self,
            ApiError::Authentication(_) | ApiError::TokenDecode(_) | ApiError::Closed
        )
    }
}
