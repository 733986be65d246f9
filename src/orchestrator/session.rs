//! 一次完整的检测会话
//!
//! 会话独占自己的后端客户端与编排器：时长到期或任务全部结束即为正常退出，
//! 无论以何种方式结束都会调用 `stop` 释放资源。

use super::{Backend, Orchestrator};
use crate::detection::{DetectionEngine, SourceResolver};
use crate::error::{Error, Result};
use crate::supervisor::SessionRunner;
use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use spotgazer_api::SpotGazerApi;
use spotgazer_common::{ApiConfig, SpotGazerConfig};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// 为每次会话建立新的后端连接
pub type BackendConnector =
    Arc<dyn Fn(&ApiConfig) -> spotgazer_api::Result<Arc<dyn Backend>> + Send + Sync>;

pub struct DetectionSession {
    config: SpotGazerConfig,
    engine: Arc<dyn DetectionEngine>,
    resolver: Arc<dyn SourceResolver>,
    connect: BackendConnector,
}

impl std::fmt::Debug for DetectionSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetectionSession")
            .field("name", &self.config.name)
            .field("engine", &self.engine)
            .field("resolver", &self.resolver)
            .finish_non_exhaustive()
    }
}

impl DetectionSession {
    pub fn new(
        config: SpotGazerConfig,
        engine: Arc<dyn DetectionEngine>,
        resolver: Arc<dyn SourceResolver>,
    ) -> Self {
        let connect: BackendConnector = Arc::new(
            |api: &ApiConfig| -> spotgazer_api::Result<Arc<dyn Backend>> {
                Ok(Arc::new(SpotGazerApi::new(api)?))
            },
        );
        Self::with_connector(config, engine, resolver, connect)
    }

    pub fn with_connector(
        config: SpotGazerConfig,
        engine: Arc<dyn DetectionEngine>,
        resolver: Arc<dyn SourceResolver>,
        connect: BackendConnector,
    ) -> Self {
        Self {
            config,
            engine,
            resolver,
            connect,
        }
    }
}

#[async_trait]
impl SessionRunner for DetectionSession {
    async fn run_session(&self, shutdown: &CancellationToken) -> Result<()> {
        let session = &self.config.session;
        let duration = session.duration();
        let lease_until = Utc::now()
            + TimeDelta::from_std(duration)
                .map_err(|e| Error::custom(format!("session duration out of range: {e}")))?;

        let backend = (self.connect)(&self.config.api)?;
        let mut orchestrator = Orchestrator::new(
            backend,
            Arc::clone(&self.engine),
            Arc::clone(&self.resolver),
            session,
        );

        let outcome = tokio::select! {
            _ = shutdown.cancelled() => {
                info!("Shutdown requested, stopping detection session");
                Ok(())
            }
            finished = tokio::time::timeout(duration, async {
                orchestrator.start(lease_until, session.max_streams).await?;
                orchestrator.wait().await
            }) => match finished {
                Ok(result) => result,
                Err(_) => {
                    info!("Session duration of {:?} elapsed", duration);
                    Ok(())
                }
            },
        };

        orchestrator.stop().await;
        outcome
    }
}
