//! SpotGazer 停车场占用检测主程序
//!
//! 加载配置、初始化日志，然后在监督循环中反复运行检测会话

mod cli;

use clap::Parser;
use spotgazer::detection::{CommandDetector, YtDlpResolver};
use spotgazer::observability::init_observability;
use spotgazer::{DetectionSession, Error, Result, SpotGazerConfig, Supervisor};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

macro_rules! bootstrap_info {
    ($($arg:tt)*) => {
        println!($($arg)*);
    };
}

macro_rules! bootstrap_error {
    ($($arg:tt)*) => {
        eprintln!($($arg)*);
    };
}

use cli::{Cli, Commands};

/// Application launcher utilities
struct ApplicationLauncher;

fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Some(Commands::Test { config_file }) => {
            ApplicationLauncher::test_config(config_file.as_deref().or(cli.config.as_deref()))
        }
        None => {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;

            runtime.block_on(ApplicationLauncher::run_application(cli.config.as_deref()))
        }
    }
}

impl ApplicationLauncher {
    /// 测试配置是否有效
    fn test_config(config_path: Option<&Path>) -> Result<()> {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .init();

        let source = config_path
            .map(|p| format!("{p:?}"))
            .unwrap_or_else(|| "environment".to_string());

        match SpotGazerConfig::load(config_path) {
            Ok(config) => {
                info!("✅ 配置解析成功: {}", source);

                if let Err(errors) = config.validate() {
                    error!("❌ 配置验证发现问题:");
                    for (i, err) in errors.iter().enumerate() {
                        if err.starts_with("Warning:") {
                            info!("  {}. ⚠️  {}", i + 1, err);
                        } else {
                            error!("  {}. ❌ {}", i + 1, err);
                        }
                    }
                    if !SpotGazerConfig::critical_errors(&errors).is_empty() {
                        return Err(Error::custom("配置验证失败"));
                    }
                }

                info!("✅ 完整配置验证通过");
                Ok(())
            }
            Err(e) => {
                error!("❌ 配置解析失败: {}", e);
                Err(e.into())
            }
        }
    }

    /// 运行应用程序的主入口
    async fn run_application(config_path: Option<&Path>) -> Result<()> {
        match config_path {
            Some(path) => {
                bootstrap_info!("📄 加载配置文件: {:?}", path);
            }
            None => {
                bootstrap_info!("📄 从环境变量加载配置");
            }
        }

        let config = match SpotGazerConfig::load(config_path) {
            Ok(config) => {
                if let Err(errors) = config.validate() {
                    bootstrap_error!("❌ 配置验证发现问题:");
                    for (i, err) in errors.iter().enumerate() {
                        if err.starts_with("Warning:") {
                            bootstrap_info!("  {}. ⚠️  {}", i + 1, err);
                        } else {
                            bootstrap_error!("  {}. ❌ {}", i + 1, err);
                        }
                    }
                }
                config.ensure_valid()?;
                bootstrap_info!("✅ 配置加载成功");
                config
            }
            Err(e) => {
                bootstrap_error!("❌ 配置加载失败: {}", e);
                return Err(e.into());
            }
        };

        let observability_guard = init_observability(&config.observability)?;
        if observability_guard.writes_file() {
            info!(
                "日志文件目录: {} (级别: {})",
                config.observability.log.path, config.observability.file_level
            );
        }

        let shutdown = CancellationToken::new();
        setup_shutdown_handler(shutdown.clone());

        let engine = Arc::new(CommandDetector::from_config(&config.detector));
        let resolver = Arc::new(YtDlpResolver::from_config(&config.detector));
        info!(
            "🚀 启动 {}: api={}, 会话时长={}s, 最多 {} 个停车场",
            config.name,
            config.api.base_url,
            config.session.duration_secs,
            config.session.max_streams
        );

        let session = Arc::new(DetectionSession::new(config.clone(), engine, resolver));
        let supervisor = Supervisor::new(session, &config.session);

        match supervisor.run(shutdown).await {
            Ok(()) => {
                info!("🛑 检测已安全关闭");
                Ok(())
            }
            Err(e) => {
                error!("❌ {}", e);
                Err(e)
            }
        }
    }
}

/// 设置 Ctrl-C / SIGTERM 信号处理程序
fn setup_shutdown_handler(shutdown: CancellationToken) {
    tokio::spawn(async move {
        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    error!("无法监听SIGTERM信号: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };
        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    error!("无法监听Ctrl-C信号: {}", e);
                    return;
                }
                info!("收到Ctrl-C信号，开始优雅关闭...");
            }
            _ = terminate => info!("收到SIGTERM信号，开始优雅关闭..."),
        }
        shutdown.cancel();
    });
}
