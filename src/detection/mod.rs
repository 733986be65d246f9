//! 检测能力与分享链接解析的接口
//!
//! 编排器只通过 "打开视频源 → 惰性的逐帧检测结果序列" 这一窄接口使用检测能力，
//! 具体模型与推理不在本 crate 内。

pub mod command;
pub mod resolver;

use async_trait::async_trait;
use serde::Deserialize;
use std::fmt::Debug;
use thiserror::Error;

pub use command::CommandDetector;
pub use resolver::{ResolveError, SourceResolver, YtDlpResolver};

/// 单帧检测结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Detection {
    /// 本帧识别出的车辆数
    pub vehicles: u32,
}

/// 检测序列错误
#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("cannot open {stream_source}: {reason}")]
    Open {
        stream_source: String,
        reason: String,
    },

    #[error("connection lost: {0}")]
    Connectivity(String),

    #[error("malformed detection output: {0}")]
    Malformed(String),
}

/// 外部检测能力：为一个视频源打开检测序列
#[async_trait]
pub trait DetectionEngine: Send + Sync + Debug {
    async fn open(&self, stream_source: &str) -> Result<Box<dyn DetectionStream>, DetectionError>;
}

/// 一个视频源上的逐帧检测序列
///
/// `next_detection` 必须是取消安全的：编排器在停止时会直接丢弃正在等待的调用。
/// 实现需要在 `close` 或 drop 时释放解码与网络资源。
#[async_trait]
pub trait DetectionStream: Send + Debug {
    /// 下一帧结果；`Ok(None)` 表示序列结束
    async fn next_detection(&mut self) -> Result<Option<Detection>, DetectionError>;

    /// 关闭序列，可重复调用
    async fn close(&mut self);
}
