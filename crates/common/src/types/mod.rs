//! 后端交换的数据模型
//!
//! 发现接口返回的停车场/视频流描述，以及每个轮询周期上报的占用结果

mod occupancy;
mod stream;

pub use occupancy::OccupancyReport;
pub use stream::{DiscoveryPage, ParkingLotStreams, VideoStreamSource};

/// 视频流 ID（后端主键）
pub type StreamId = i64;

/// 停车场 ID（后端主键）
pub type ParkingLotId = i64;
