use super::{ParkingLotId, StreamId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 单路摄像头视频源
///
/// 由发现接口产生；编排器只读，租约（`in_use_until`）由后端在发现时写入
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoStreamSource {
    pub id: StreamId,

    /// 视频地址，或需要解析的分享链接
    pub stream_source: String,

    #[serde(default = "default_is_active")]
    pub is_active: bool,

    #[serde(default)]
    pub in_use_until: Option<DateTime<Utc>>,
}

fn default_is_active() -> bool {
    true
}

/// 一个停车场及其全部视频流，驱动且仅驱动一个停车场任务
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParkingLotStreams {
    pub parking_lot_id: ParkingLotId,

    /// 两次轮询之间的间隔（秒）
    pub processing_rate: u64,

    #[serde(default)]
    pub streams: Vec<VideoStreamSource>,
}

impl ParkingLotStreams {
    /// 两次上报周期之间的休眠时间
    pub fn processing_interval(&self) -> Duration {
        Duration::from_secs(self.processing_rate)
    }
}

/// `GET /api/video-stream-sources/` 的响应体
///
/// 分页字段（count/next/previous）不被消费
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscoveryPage {
    #[serde(default)]
    pub results: Vec<ParkingLotStreams>,
}
