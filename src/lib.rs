//! # spotgazer
//!
//! 从实时摄像头视频流估算停车场占用情况：领取视频源、逐帧检测车辆、
//! 按停车场汇总上报，并在会话异常退出时自动重启。

pub mod detection;
pub mod error;
pub mod observability;
pub mod orchestrator;
pub mod supervisor;

// Re-export commonly used types
pub use error::{Error, Result};
pub use orchestrator::{Backend, DetectionSession, Orchestrator};
pub use spotgazer_common::SpotGazerConfig;
pub use supervisor::{SessionRunner, Supervisor};
