//! 场景测试共用的内存后端与脚本化检测能力

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use spotgazer::Backend;
use spotgazer::detection::{
    Detection, DetectionEngine, DetectionError, DetectionStream, ResolveError, SourceResolver,
};
use spotgazer_api::{ApiError, Result as ApiResult};
use spotgazer_common::{
    OccupancyReport, ParkingLotId, ParkingLotStreams, SessionConfig, StreamId, VideoStreamSource,
};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

pub fn lot(id: ParkingLotId, rate: u64, streams: &[(StreamId, &str)]) -> ParkingLotStreams {
    ParkingLotStreams {
        parking_lot_id: id,
        processing_rate: rate,
        streams: streams
            .iter()
            .map(|(stream_id, source)| VideoStreamSource {
                id: *stream_id,
                stream_source: source.to_string(),
                is_active: true,
                in_use_until: None,
            })
            .collect(),
    }
}

pub fn session_config() -> SessionConfig {
    SessionConfig {
        duration_secs: 600,
        max_streams: 20,
        max_attempts: 3,
        backoff_secs: 5,
        stop_grace_secs: 5,
        frame_timeout_secs: 60,
    }
}

#[derive(Debug)]
pub struct FakeBackend {
    started: Instant,
    lots: Mutex<Vec<ParkingLotStreams>>,
    report_failures: Mutex<VecDeque<u16>>,
    credentials_revoked: AtomicBool,
    reports: Mutex<Vec<(OccupancyReport, Duration)>>,
    deactivated: Mutex<Vec<StreamId>>,
    leases: Mutex<Vec<(DateTime<Utc>, u32)>>,
    closes: AtomicU32,
}

impl FakeBackend {
    pub fn with_lots(lots: Vec<ParkingLotStreams>) -> Arc<Self> {
        Arc::new(Self {
            started: Instant::now(),
            lots: Mutex::new(lots),
            report_failures: Mutex::new(VecDeque::new()),
            credentials_revoked: AtomicBool::new(false),
            reports: Mutex::new(Vec::new()),
            deactivated: Mutex::new(Vec::new()),
            leases: Mutex::new(Vec::new()),
            closes: AtomicU32::new(0),
        })
    }

    /// 接下来的上报依次以这些 HTTP 状态码失败
    pub fn fail_reports(&self, statuses: &[u16]) {
        self.report_failures
            .lock()
            .unwrap()
            .extend(statuses.iter().copied());
    }

    /// 此后令牌无法再登录或刷新，所有上报都以认证失败结束
    pub fn revoke_credentials(&self) {
        self.credentials_revoked.store(true, Ordering::SeqCst);
    }

    /// 某个停车场上报的车辆数，按上报顺序
    pub fn reported(&self, lot_id: ParkingLotId) -> Vec<u32> {
        self.reports
            .lock()
            .unwrap()
            .iter()
            .filter(|(r, _)| r.parking_lot_id == lot_id)
            .map(|(r, _)| r.occupied_spots)
            .collect()
    }

    /// 某个停车场每次上报距离创建时的秒数
    pub fn report_times(&self, lot_id: ParkingLotId) -> Vec<u64> {
        self.reports
            .lock()
            .unwrap()
            .iter()
            .filter(|(r, _)| r.parking_lot_id == lot_id)
            .map(|(_, at)| at.as_secs())
            .collect()
    }

    pub fn report_count(&self) -> usize {
        self.reports.lock().unwrap().len()
    }

    pub fn deactivated(&self) -> Vec<StreamId> {
        self.deactivated.lock().unwrap().clone()
    }

    pub fn leases(&self) -> Vec<(DateTime<Utc>, u32)> {
        self.leases.lock().unwrap().clone()
    }

    pub fn closes(&self) -> u32 {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn discover_sources(
        &self,
        lease_until: DateTime<Utc>,
        limit: u32,
    ) -> ApiResult<Vec<ParkingLotStreams>> {
        self.leases.lock().unwrap().push((lease_until, limit));
        Ok(self.lots.lock().unwrap().clone())
    }

    async fn report_occupancy(&self, report: &OccupancyReport) -> ApiResult<()> {
        if self.credentials_revoked.load(Ordering::SeqCst) {
            return Err(ApiError::Authentication(
                "http://fake/api/token/refresh/: 401 Unauthorized".to_string(),
            ));
        }
        if let Some(status) = self.report_failures.lock().unwrap().pop_front() {
            return Err(ApiError::Http {
                status,
                url: "http://fake/api/occupancy/".to_string(),
                body: String::new(),
            });
        }
        self.reports
            .lock()
            .unwrap()
            .push((*report, self.started.elapsed()));
        Ok(())
    }

    async fn deactivate_stream(&self, stream_id: StreamId) -> ApiResult<()> {
        self.deactivated.lock().unwrap().push(stream_id);
        Ok(())
    }

    async fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Count(u32),
    End,
    Fail,
    Hang,
}

#[derive(Debug, Clone)]
struct Script {
    steps: Vec<Step>,
    then: Step,
}

/// 按视频地址返回预设结果序列的检测能力
#[derive(Debug, Default)]
pub struct FakeEngine {
    scripts: Mutex<HashMap<String, Script>>,
    unopenable: Mutex<HashSet<String>>,
    opened: Mutex<Vec<String>>,
    closed: Arc<Mutex<Vec<String>>>,
}

impl FakeEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// 依次产出 `steps`，之后结束
    pub fn script(&self, source: &str, steps: &[Step]) {
        self.script_then(source, steps, Step::End);
    }

    /// 依次产出 `steps`，之后一直产出 `then`
    pub fn script_then(&self, source: &str, steps: &[Step], then: Step) {
        self.scripts.lock().unwrap().insert(
            source.to_string(),
            Script {
                steps: steps.to_vec(),
                then,
            },
        );
    }

    pub fn refuse(&self, source: &str) {
        self.unopenable.lock().unwrap().insert(source.to_string());
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }

    pub fn closed(&self) -> Vec<String> {
        let mut closed = self.closed.lock().unwrap().clone();
        closed.sort();
        closed
    }
}

#[async_trait]
impl DetectionEngine for FakeEngine {
    async fn open(&self, stream_source: &str) -> Result<Box<dyn DetectionStream>, DetectionError> {
        if self.unopenable.lock().unwrap().contains(stream_source) {
            return Err(DetectionError::Open {
                stream_source: stream_source.to_string(),
                reason: "unreadable source".to_string(),
            });
        }

        let script = self
            .scripts
            .lock()
            .unwrap()
            .get(stream_source)
            .cloned()
            .unwrap_or(Script {
                steps: Vec::new(),
                then: Step::End,
            });
        self.opened.lock().unwrap().push(stream_source.to_string());

        Ok(Box::new(FakeStream {
            source: stream_source.to_string(),
            steps: script.steps.into(),
            then: script.then,
            closed_log: Arc::clone(&self.closed),
            closed: false,
        }))
    }
}

#[derive(Debug)]
struct FakeStream {
    source: String,
    steps: VecDeque<Step>,
    then: Step,
    closed_log: Arc<Mutex<Vec<String>>>,
    closed: bool,
}

#[async_trait]
impl DetectionStream for FakeStream {
    async fn next_detection(&mut self) -> Result<Option<Detection>, DetectionError> {
        match self.steps.pop_front().unwrap_or(self.then) {
            Step::Count(vehicles) => Ok(Some(Detection { vehicles })),
            Step::End => Ok(None),
            Step::Fail => Err(DetectionError::Connectivity(format!(
                "{}: connection reset",
                self.source
            ))),
            Step::Hang => std::future::pending().await,
        }
    }

    async fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.closed_log.lock().unwrap().push(self.source.clone());
        }
    }
}

/// `share://` 链接换成 `cam://`；包含 "private" 的链接无法解析，包含 "stuck" 的永不返回
#[derive(Debug, Default)]
pub struct FakeResolver;

#[async_trait]
impl SourceResolver for FakeResolver {
    fn needs_resolution(&self, stream_source: &str) -> bool {
        stream_source.starts_with("share://")
    }

    async fn resolve(&self, stream_source: &str) -> Result<String, ResolveError> {
        if stream_source.contains("stuck") {
            return std::future::pending().await;
        }
        if stream_source.contains("private") {
            return Err(ResolveError::Failed {
                program: "fake-resolver".to_string(),
                link: stream_source.to_string(),
                message: "video unavailable".to_string(),
            });
        }
        Ok(stream_source.replacen("share://", "cam://", 1))
    }
}
