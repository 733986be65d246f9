use spotgazer_common::{LogConfig, ObservabilityConfig};
use std::fs;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use crate::error::Result;

const LOG_FILE_NAME: &str = "spotgazer.log";

/// 日志文件异步写入器的守卫，drop 时刷新剩余日志
#[derive(Default)]
pub struct ObservabilityGuard {
    log_guard: Option<WorkerGuard>,
}

impl ObservabilityGuard {
    pub fn writes_file(&self) -> bool {
        self.log_guard.is_some()
    }
}

/// 初始化控制台和文件日志，两个输出各自使用独立的过滤器
pub fn init_observability(config: &ObservabilityConfig) -> Result<ObservabilityGuard> {
    let mut guard = ObservabilityGuard::default();

    let console_layer = fmt::layer()
        .with_target(true)
        .with_level(true)
        .with_line_number(true)
        .with_ansi(true)
        .with_writer(std::io::stdout)
        .with_filter(create_env_filter(&config.console_level, true));

    let file_layer = if config.log.file {
        fs::create_dir_all(&config.log.path)?;
        let (non_blocking, worker_guard) = build_file_writer(&config.log)?;
        guard.log_guard = Some(worker_guard);

        Some(
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_line_number(true)
                .with_file(true)
                .with_ansi(false)
                .with_writer(non_blocking)
                .with_filter(create_env_filter(&config.file_level, false)),
        )
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .ok();

    Ok(guard)
}

/// 由配置的级别创建 EnvFilter
///
/// 只有控制台输出优先使用 RUST_LOG
fn create_env_filter(level: &str, use_rust_log: bool) -> EnvFilter {
    let directive = use_rust_log
        .then(|| std::env::var("RUST_LOG").ok())
        .flatten()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| normalize_level(level));

    EnvFilter::try_new(&directive).unwrap_or_else(|_| {
        println!(
            "Failed to parse filter directive: {}. Falling back to default: info",
            directive
        );
        EnvFilter::new("info")
    })
}

/// 兼容 WARNING / CRITICAL 等常见级别写法
fn normalize_level(level: &str) -> String {
    match level.trim().to_ascii_lowercase().as_str() {
        "warning" => "warn".to_string(),
        "critical" | "fatal" => "error".to_string(),
        "notset" | "" => "trace".to_string(),
        other => other.to_string(),
    }
}

fn build_file_writer(log_config: &LogConfig) -> Result<(NonBlocking, WorkerGuard)> {
    if log_config.rotate {
        println!("日志写入模式: 文件");
        println!("  - 路径: {}", log_config.path);
        println!("  - 轮转: 开启（按天）");
        let file_appender = tracing_appender::rolling::daily(&log_config.path, LOG_FILE_NAME);
        Ok(tracing_appender::non_blocking(file_appender))
    } else {
        let log_file_path = std::path::Path::new(&log_config.path).join(LOG_FILE_NAME);
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_file_path)?;
        Ok(tracing_appender::non_blocking(file))
    }
}
