//! 停车场检测编排
//!
//! 一个 [`Orchestrator`] 对应一次会话：领取视频源，为每个停车场启动独立任务，
//! 等待任务结束，停止时取消全部任务并释放后端会话。

mod backend;
mod lot;
mod session;

pub use backend::Backend;
pub use lot::LotOutcome;
pub use session::{BackendConnector, DetectionSession};

use crate::detection::{DetectionEngine, SourceResolver};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use lot::{LotContext, LotTask};
use spotgazer_common::{ParkingLotId, SessionConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

type LotResult = (ParkingLotId, Result<LotOutcome>);

#[derive(Debug)]
pub struct Orchestrator {
    backend: Arc<dyn Backend>,
    engine: Arc<dyn DetectionEngine>,
    resolver: Arc<dyn SourceResolver>,
    frame_timeout: Duration,
    stop_grace: Duration,
    cancel: CancellationToken,
    tasks: JoinSet<LotResult>,
    stopped: bool,
}

impl Orchestrator {
    pub fn new(
        backend: Arc<dyn Backend>,
        engine: Arc<dyn DetectionEngine>,
        resolver: Arc<dyn SourceResolver>,
        config: &SessionConfig,
    ) -> Self {
        Self {
            backend,
            engine,
            resolver,
            frame_timeout: config.frame_timeout(),
            stop_grace: config.stop_grace(),
            cancel: CancellationToken::new(),
            tasks: JoinSet::new(),
            stopped: false,
        }
    }

    /// 领取视频源并为每个停车场启动检测任务
    ///
    /// 等待所有停车场完成视频流的打开后返回仍有活跃视频流的停车场数量。
    /// 发现接口返回空列表时返回 [`Error::NoSourcesAvailable`]。
    pub async fn start(&mut self, lease_until: DateTime<Utc>, stream_limit: u32) -> Result<usize> {
        let lots = self
            .backend
            .discover_sources(lease_until, stream_limit)
            .await?;
        if lots.is_empty() {
            warn!("No parking lots to process");
            return Err(Error::NoSourcesAvailable);
        }

        let mut pending = Vec::with_capacity(lots.len());
        for lot in lots {
            let lot_id = lot.parking_lot_id;
            let ctx = self.lot_context();
            let (ready_tx, ready_rx) = oneshot::channel();

            self.tasks.spawn(async move {
                let cancel = ctx.cancel.clone();
                let task = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return (lot_id, Ok(LotOutcome::Cancelled)),
                    task = LotTask::setup(lot, ctx) => task,
                };

                match task {
                    Ok(task) => {
                        let _ = ready_tx.send(task.active_count());
                        (task.parking_lot_id(), task.run().await)
                    }
                    Err(e) => (lot_id, Err(e)),
                }
            });
            pending.push((lot_id, ready_rx));
        }

        let readiness = join_all(
            pending
                .into_iter()
                .map(|(lot_id, ready)| async move { (lot_id, ready.await) }),
        )
        .await;

        let mut running = 0;
        for (lot_id, ready) in readiness {
            match ready {
                Ok(0) => warn!("Parking lot ID {} has no usable streams", lot_id),
                Ok(active) => {
                    debug!("Parking lot ID {} running {} streams", lot_id, active);
                    running += 1;
                }
                Err(_) => warn!("Setup of parking lot ID {} did not complete", lot_id),
            }
        }

        info!(
            "Occupancy detection of {} parking lots has been started!",
            running
        );
        Ok(running)
    }

    /// 等待全部停车场任务结束
    ///
    /// 单个停车场的失败不影响其他停车场；会话级错误立即返回。
    pub async fn wait(&mut self) -> Result<()> {
        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok((lot_id, Ok(outcome))) => {
                    info!("Parking lot ID {} finished: {:?}", lot_id, outcome)
                }
                Ok((lot_id, Err(e))) if e.is_session_fatal() => {
                    error!("Parking lot ID {} hit a session error: {}", lot_id, e);
                    return Err(e);
                }
                Ok((lot_id, Err(e))) => error!("Parking lot ID {} failed: {}", lot_id, e),
                Err(e) if e.is_cancelled() => {}
                Err(e) => error!("Parking lot task panicked: {}", e),
            }
        }
        Ok(())
    }

    /// 停止所有停车场任务并释放后端会话，可重复调用
    pub async fn stop(&mut self) {
        self.cancel.cancel();

        if !self.tasks.is_empty() {
            let tasks = &mut self.tasks;
            let drained = tokio::time::timeout(self.stop_grace, async {
                while tasks.join_next().await.is_some() {}
            })
            .await;

            if drained.is_err() {
                warn!(
                    "Parking lot tasks still running after {:?}, aborting",
                    self.stop_grace
                );
                self.tasks.abort_all();
                while self.tasks.join_next().await.is_some() {}
            }
        }

        self.backend.close().await;

        if !self.stopped {
            self.stopped = true;
            info!("Detection stopped!");
        }
    }

    fn lot_context(&self) -> LotContext {
        LotContext {
            backend: Arc::clone(&self.backend),
            engine: Arc::clone(&self.engine),
            resolver: Arc::clone(&self.resolver),
            frame_timeout: self.frame_timeout,
            cancel: self.cancel.clone(),
        }
    }
}
