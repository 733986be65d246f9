//! SpotGazer 基础设施库
//!
//! 为占用检测编排服务提供共享的配置模型、配置错误以及与后端交换的数据结构

pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types for convenience
pub use config::{
    ApiConfig, DetectorConfig, LogConfig, ObservabilityConfig, SessionConfig, SpotGazerConfig,
};
pub use error::{ConfigError, Result};
pub use types::{
    DiscoveryPage, OccupancyReport, ParkingLotId, ParkingLotStreams, StreamId, VideoStreamSource,
};
