//! SpotGazer API - 后端 HTTP 客户端
//!
//! # Components
//!
//! - **JwtClient**: 管理 access/refresh 令牌对，每次请求前按需登录或刷新，
//!   并发调用者共享同一次刷新结果
//! - **SpotGazerApi**: 编排器使用的类型化接口（发现视频源、上报占用、停用视频流）

pub mod client;
pub mod endpoints;
pub mod error;
mod token;

pub use client::{JwtClient, RequestKind};
pub use endpoints::SpotGazerApi;
pub use error::{ApiError, Result};
