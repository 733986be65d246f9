//! 编排器使用的后端接口

use crate::client::{JwtClient, RequestKind};
use crate::error::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use spotgazer_common::{
    ApiConfig, DiscoveryPage, OccupancyReport, ParkingLotStreams, StreamId,
};
use tracing::{debug, info};

pub const VIDEO_STREAM_SOURCES_PATH: &str = "/api/video-stream-sources/";
pub const OCCUPANCY_PATH: &str = "/api/occupancy/";

#[derive(Serialize)]
struct StreamActivity {
    is_active: bool,
}

/// SpotGazer 后端接口
#[derive(Debug)]
pub struct SpotGazerApi {
    client: JwtClient,
}

impl SpotGazerApi {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        Ok(Self {
            client: JwtClient::new(config)?,
        })
    }

    pub fn client(&self) -> &JwtClient {
        &self.client
    }

    /// 列出可用视频源，并由后端把它们标记为占用直到 `lease_until`
    pub async fn discover_sources(
        &self,
        lease_until: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<ParkingLotStreams>> {
        let query = [
            ("active_only", "1".to_string()),
            ("limit", limit.to_string()),
            (
                "mark_in_use_until",
                lease_until.to_rfc3339_opts(SecondsFormat::Micros, false),
            ),
        ];

        let page: DiscoveryPage = self
            .client
            .request_json(RequestKind::Get, VIDEO_STREAM_SOURCES_PATH, &query)
            .await?;

        info!(
            "Discovered {} parking lots (leased until {})",
            page.results.len(),
            lease_until
        );
        Ok(page.results)
    }

    /// 上报一个周期的占用结果，返回后端的确认内容
    pub async fn report_occupancy(&self, report: &OccupancyReport) -> Result<serde_json::Value> {
        let ack: serde_json::Value = self
            .client
            .request_json(RequestKind::Post, OCCUPANCY_PATH, report)
            .await?;
        debug!("Occupancy acknowledged: {}", ack);
        Ok(ack)
    }

    /// 通知后端停用一路视频流
    pub async fn deactivate_stream(&self, stream_id: StreamId) -> Result<()> {
        let path = format!("{VIDEO_STREAM_SOURCES_PATH}{stream_id}/");
        self.client
            .request(
                RequestKind::Patch,
                &path,
                &StreamActivity { is_active: false },
            )
            .await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.client.close().await;
    }
}
