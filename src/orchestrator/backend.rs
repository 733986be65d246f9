//! 编排器与后端之间的接口
//!
//! 生产环境使用 [`SpotGazerApi`]；测试中可以替换为内存实现。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use spotgazer_api::{Result as ApiResult, SpotGazerApi};
use spotgazer_common::{OccupancyReport, ParkingLotStreams, StreamId};
use std::fmt::Debug;

#[async_trait]
pub trait Backend: Send + Sync + Debug {
    /// 领取可用视频源并租用到 `lease_until`
    async fn discover_sources(
        &self,
        lease_until: DateTime<Utc>,
        limit: u32,
    ) -> ApiResult<Vec<ParkingLotStreams>>;

    async fn report_occupancy(&self, report: &OccupancyReport) -> ApiResult<()>;

    async fn deactivate_stream(&self, stream_id: StreamId) -> ApiResult<()>;

    /// 释放后端会话，可重复调用
    async fn close(&self);
}

#[async_trait]
impl Backend for SpotGazerApi {
    async fn discover_sources(
        &self,
        lease_until: DateTime<Utc>,
        limit: u32,
    ) -> ApiResult<Vec<ParkingLotStreams>> {
        SpotGazerApi::discover_sources(self, lease_until, limit).await
    }

    async fn report_occupancy(&self, report: &OccupancyReport) -> ApiResult<()> {
        SpotGazerApi::report_occupancy(self, report).await.map(|_| ())
    }

    async fn deactivate_stream(&self, stream_id: StreamId) -> ApiResult<()> {
        SpotGazerApi::deactivate_stream(self, stream_id).await
    }

    async fn close(&self) {
        SpotGazerApi::close(self).await
    }
}
