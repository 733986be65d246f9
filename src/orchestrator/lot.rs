//! 单个停车场的检测任务
//!
//! 每个周期按顺序从每路活跃视频流各取一帧结果（lockstep），
//! 全部成功时把车辆数求和上报，然后按停车场的处理间隔休眠。
//! 任一路视频流结束、出错或超时都会被停用并移出活跃集合，该周期不上报，
//! 下一个周期立即开始。活跃集合为空时任务结束。

use super::backend::Backend;
use crate::detection::{DetectionEngine, DetectionStream, SourceResolver};
use crate::error::Result;
use spotgazer_common::{OccupancyReport, ParkingLotId, ParkingLotStreams, StreamId, VideoStreamSource};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// 停车场任务共享的依赖
#[derive(Debug, Clone)]
pub(crate) struct LotContext {
    pub(crate) backend: Arc<dyn Backend>,
    pub(crate) engine: Arc<dyn DetectionEngine>,
    pub(crate) resolver: Arc<dyn SourceResolver>,
    pub(crate) frame_timeout: Duration,
    pub(crate) cancel: CancellationToken,
}

impl LotContext {
    /// 通知后端停用视频流；非会话级错误只记录日志
    async fn deactivate(&self, stream_id: StreamId) -> Result<()> {
        warn!("Parking lot stream {} is not active anymore", stream_id);
        match self.backend.deactivate_stream(stream_id).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_session_fatal() => Err(e.into()),
            Err(e) => {
                warn!("Failed to deactivate stream ID {}: {}", stream_id, e);
                Ok(())
            }
        }
    }
}

/// 停车场任务的结束方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LotOutcome {
    /// 所有视频流都已停用
    Exhausted,
    /// 收到停止信号
    Cancelled,
}

#[derive(Debug)]
struct ActiveStream {
    source: VideoStreamSource,
    detections: Box<dyn DetectionStream>,
}

enum Cycle {
    /// 所有视频流都产出了结果，值为车辆总数
    Complete(u32),
    /// 有视频流失败，本周期丢弃
    Incomplete,
}

#[derive(Debug)]
pub(crate) struct LotTask {
    parking_lot_id: ParkingLotId,
    interval: Duration,
    active: Vec<ActiveStream>,
    ctx: LotContext,
}

impl LotTask {
    /// 解析并打开停车场下的全部视频流
    ///
    /// 无法解析或打开的视频流会被停用，解析和打开各自受 `frame_timeout` 限制；
    /// 只有会话级的后端错误才会返回 Err。
    pub(crate) async fn setup(lot: ParkingLotStreams, ctx: LotContext) -> Result<Self> {
        info!(
            "Determining the occupancy of parking lot ID {}",
            lot.parking_lot_id
        );

        let mut task = Self {
            parking_lot_id: lot.parking_lot_id,
            interval: lot.processing_interval(),
            active: Vec::with_capacity(lot.streams.len()),
            ctx,
        };

        for source in lot.streams {
            if !source.is_active {
                debug!("Skipping inactive stream ID {}", source.id);
                continue;
            }

            let target = if task.ctx.resolver.needs_resolution(&source.stream_source) {
                let resolving = task.ctx.resolver.resolve(&source.stream_source);
                match tokio::time::timeout(task.ctx.frame_timeout, resolving).await {
                    Ok(Ok(resolved)) => resolved,
                    Ok(Err(e)) => {
                        error!("Can't resolve stream ID {}: {}", source.id, e);
                        task.ctx.deactivate(source.id).await?;
                        continue;
                    }
                    Err(_) => {
                        error!(
                            "Resolving stream ID {} timed out after {:?}",
                            source.id, task.ctx.frame_timeout
                        );
                        task.ctx.deactivate(source.id).await?;
                        continue;
                    }
                }
            } else {
                source.stream_source.clone()
            };

            match tokio::time::timeout(task.ctx.frame_timeout, task.ctx.engine.open(&target)).await {
                Ok(Ok(detections)) => {
                    debug!(
                        "Stream ID {} opened for parking lot ID {}",
                        source.id, task.parking_lot_id
                    );
                    task.active.push(ActiveStream { source, detections });
                }
                Ok(Err(e)) => {
                    error!("Can't open stream ID {}: {}", source.id, e);
                    task.ctx.deactivate(source.id).await?;
                }
                Err(_) => {
                    error!(
                        "Opening stream ID {} timed out after {:?}",
                        source.id, task.ctx.frame_timeout
                    );
                    task.ctx.deactivate(source.id).await?;
                }
            }
        }

        Ok(task)
    }

    pub(crate) fn parking_lot_id(&self) -> ParkingLotId {
        self.parking_lot_id
    }

    pub(crate) fn active_count(&self) -> usize {
        self.active.len()
    }

    /// 运行检测循环直到活跃集合为空或收到停止信号，退出前关闭所有视频流
    pub(crate) async fn run(mut self) -> Result<LotOutcome> {
        let cancel = self.ctx.cancel.clone();

        let outcome = loop {
            if self.active.is_empty() {
                warn!(
                    "No active streams left on parking lot ID {}",
                    self.parking_lot_id
                );
                break Ok(LotOutcome::Exhausted);
            }

            let cycle = tokio::select! {
                biased;
                _ = cancel.cancelled() => break Ok(LotOutcome::Cancelled),
                cycle = self.poll_cycle() => cycle,
            };

            let total = match cycle {
                Ok(Cycle::Complete(total)) => total,
                Ok(Cycle::Incomplete) => continue,
                Err(e) => break Err(e),
            };

            let report = OccupancyReport::new(self.parking_lot_id, total);
            let sent = tokio::select! {
                biased;
                _ = cancel.cancelled() => break Ok(LotOutcome::Cancelled),
                sent = self.ctx.backend.report_occupancy(&report) => sent,
            };
            match sent {
                Ok(()) => debug!(
                    "Parking lot ID {}: {} occupied spots",
                    self.parking_lot_id, total
                ),
                Err(e) if e.is_session_fatal() => break Err(e.into()),
                Err(e) => warn!(
                    "Failed to report occupancy of parking lot ID {}: {}",
                    self.parking_lot_id, e
                ),
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break Ok(LotOutcome::Cancelled),
                _ = tokio::time::sleep(self.interval) => {}
            }
        };

        self.close_all().await;
        outcome
    }

    async fn poll_cycle(&mut self) -> Result<Cycle> {
        let frame_timeout = self.ctx.frame_timeout;
        let mut total: u32 = 0;

        for index in 0..self.active.len() {
            let stream = &mut self.active[index];
            let pulled = tokio::time::timeout(frame_timeout, stream.detections.next_detection()).await;

            let failure = match pulled {
                Ok(Ok(Some(detection))) => {
                    total = total.saturating_add(detection.vehicles);
                    continue;
                }
                Ok(Ok(None)) => "stream ended".to_string(),
                Ok(Err(e)) => e.to_string(),
                Err(_) => format!("no detection within {frame_timeout:?}"),
            };

            let mut failed = self.active.remove(index);
            error!(
                "Unexpected inference stop of stream ID {} on parking lot ID {}: {}",
                failed.source.id, self.parking_lot_id, failure
            );
            failed.detections.close().await;
            self.ctx.deactivate(failed.source.id).await?;
            return Ok(Cycle::Incomplete);
        }

        Ok(Cycle::Complete(total))
    }

    async fn close_all(&mut self) {
        for mut stream in self.active.drain(..) {
            stream.detections.close().await;
        }
    }
}
