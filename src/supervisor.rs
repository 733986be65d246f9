//! 会话监督循环
//!
//! 每次会话在独立的 tokio 任务中运行，会话内的 panic 被视为异常退出。
//! 正常退出立即开始下一次会话且不消耗重试次数；异常退出消耗一次重试并等待退避时间。
//! 重试次数耗尽时返回 [`Error::RetriesExhausted`]，收到关闭信号时返回 Ok。

use crate::error::{Error, Result};
use async_trait::async_trait;
use spotgazer_common::SessionConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// 一次可重复执行的会话
#[async_trait]
pub trait SessionRunner: Send + Sync {
    async fn run_session(&self, shutdown: &CancellationToken) -> Result<()>;
}

#[derive(Debug)]
pub struct Supervisor<R> {
    runner: Arc<R>,
    max_attempts: u32,
    backoff: Duration,
}

impl<R> Supervisor<R>
where
    R: SessionRunner + 'static,
{
    pub fn new(runner: Arc<R>, config: &SessionConfig) -> Self {
        Self {
            runner,
            max_attempts: config.max_attempts,
            backoff: config.backoff(),
        }
    }

    pub async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        let mut attempts_left = self.max_attempts;
        let mut session_no: u64 = 0;

        while attempts_left > 0 {
            if shutdown.is_cancelled() {
                return Ok(());
            }

            session_no += 1;
            info!("Starting detection session #{}", session_no);

            let runner = Arc::clone(&self.runner);
            let token = shutdown.clone();
            let exited = tokio::spawn(async move { runner.run_session(&token).await })
                .await
                .map_err(Error::from)
                .and_then(|result| result);

            if shutdown.is_cancelled() {
                info!("Detection session #{} stopped on shutdown", session_no);
                return Ok(());
            }

            match exited {
                Ok(()) => info!("Detection session #{} finished, restarting", session_no),
                Err(e) => {
                    attempts_left -= 1;
                    error!(
                        "Detection session #{} exited abnormally: {} ({} attempts left)",
                        session_no, e, attempts_left
                    );

                    tokio::select! {
                        _ = shutdown.cancelled() => return Ok(()),
                        _ = tokio::time::sleep(self.backoff) => {}
                    }
                }
            }
        }

        warn!("Giving up after {} abnormal session exits", self.max_attempts);
        Err(Error::RetriesExhausted {
            attempts: self.max_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    /// 前 `clean_runs` 次正常退出，之后一直失败
    struct ScriptedRunner {
        calls: AtomicU32,
        clean_runs: u32,
    }

    impl ScriptedRunner {
        fn new(clean_runs: u32) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicU32::new(0),
                clean_runs,
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SessionRunner for ScriptedRunner {
        async fn run_session(&self, _shutdown: &CancellationToken) -> Result<()> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.clean_runs {
                Ok(())
            } else {
                Err(Error::NoSourcesAvailable)
            }
        }
    }

    struct PanickingRunner;

    #[async_trait]
    impl SessionRunner for PanickingRunner {
        async fn run_session(&self, _shutdown: &CancellationToken) -> Result<()> {
            panic!("detector crashed");
        }
    }

    /// 第 `stop_on` 次会话中触发关闭信号
    struct ShutdownRunner {
        calls: AtomicU32,
        stop_on: u32,
        trigger: CancellationToken,
    }

    #[async_trait]
    impl SessionRunner for ShutdownRunner {
        async fn run_session(&self, shutdown: &CancellationToken) -> Result<()> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call == self.stop_on {
                self.trigger.cancel();
                shutdown.cancelled().await;
                return Ok(());
            }
            Err(Error::custom("backend unreachable"))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_twelve_failures() {
        let runner = ScriptedRunner::new(0);
        let supervisor = Supervisor::new(Arc::clone(&runner), &SessionConfig::default());

        let started = Instant::now();
        let err = supervisor.run(CancellationToken::new()).await.unwrap_err();

        assert!(matches!(err, Error::RetriesExhausted { attempts: 12 }));
        assert_eq!(runner.calls(), 12);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(12 * 5));
        assert!(elapsed < Duration::from_secs(12 * 5 + 1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_clean_exits_do_not_consume_attempts() {
        let runner = ScriptedRunner::new(3);
        let supervisor = Supervisor::new(Arc::clone(&runner), &SessionConfig::default());

        let started = Instant::now();
        let err = supervisor.run(CancellationToken::new()).await.unwrap_err();

        assert!(matches!(err, Error::RetriesExhausted { .. }));
        assert_eq!(runner.calls(), 3 + 12);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(12 * 5));
        assert!(elapsed < Duration::from_secs(12 * 5 + 1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_panic_counts_as_abnormal_exit() {
        let config = SessionConfig {
            max_attempts: 2,
            backoff_secs: 1,
            ..Default::default()
        };
        let supervisor = Supervisor::new(Arc::new(PanickingRunner), &config);

        let err = supervisor.run(CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, Error::RetriesExhausted { attempts: 2 }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_ends_supervision_successfully() {
        let shutdown = CancellationToken::new();
        let runner = Arc::new(ShutdownRunner {
            calls: AtomicU32::new(0),
            stop_on: 3,
            trigger: shutdown.clone(),
        });
        let supervisor = Supervisor::new(Arc::clone(&runner), &SessionConfig::default());

        supervisor.run(shutdown).await.unwrap();
        assert_eq!(runner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_during_backoff() {
        let shutdown = CancellationToken::new();
        let runner = ScriptedRunner::new(0);
        let supervisor = Supervisor::new(Arc::clone(&runner), &SessionConfig::default());

        let trigger = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(7)).await;
            trigger.cancel();
        });

        supervisor.run(shutdown).await.unwrap();
        assert_eq!(runner.calls(), 2);
    }
}
