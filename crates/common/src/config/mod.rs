//! 统一配置管理系统
//!
//! 配置只在进程启动时构造一次，随后以显式值的形式传入 Supervisor、Orchestrator 和 Auth Client。
//! 支持两种来源：TOML 配置文件，或进程环境变量（环境变量同时可以覆盖文件中的值）。

pub mod api;
pub mod detector;
pub mod session;

pub use crate::config::api::ApiConfig;
pub use crate::config::detector::DetectorConfig;
pub use crate::config::session::SessionConfig;

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const ENV_API_URL: &str = "SPOTGAZER_URL";
pub const ENV_USERNAME: &str = "SERVICE_USERNAME";
pub const ENV_PASSWORD: &str = "SERVICE_PASSWORD";
pub const ENV_SESSION_DURATION: &str = "STREAMS_USAGE_DURATION_SECS";
pub const ENV_MAX_STREAMS: &str = "MAX_STREAMS";
pub const ENV_CONSOLE_LOG_LEVEL: &str = "CONSOLE_LOG_LEVEL";
pub const ENV_FILE_LOG_LEVEL: &str = "FILE_LOG_LEVEL";
pub const ENV_LOG_PATH: &str = "LOG_PATH";
pub const ENV_DETECTOR_PROGRAM: &str = "DETECTOR_PROGRAM";

/// SpotGazer 的主配置结构体
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SpotGazerConfig {
    /// 实例名称，用于区分同时运行的多个编排进程
    #[serde(default = "default_name")]
    pub name: String,

    /// 后端 API 与服务账号
    #[serde(default)]
    pub api: ApiConfig,

    /// 会话时长、并发上限与重试策略
    #[serde(default)]
    pub session: SessionConfig,

    /// 外部检测程序
    #[serde(default)]
    pub detector: DetectorConfig,

    /// 日志配置
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// 可观测性配置
///
/// 控制台与文件两路输出各自拥有独立的过滤级别
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ObservabilityConfig {
    /// 控制台过滤级别，支持 EnvFilter 语法（如 "debug,hyper=warn"），RUST_LOG 优先
    #[serde(default = "default_console_level")]
    pub console_level: String,

    /// 文件过滤级别
    #[serde(default = "default_file_level")]
    pub file_level: String,

    #[serde(default)]
    pub log: LogConfig,
}

/// 日志文件配置
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LogConfig {
    /// 是否写日志文件
    #[serde(default = "default_file_enabled")]
    pub file: bool,

    /// 日志轮转开关（按天）
    #[serde(default)]
    pub rotate: bool,

    /// 日志文件目录
    #[serde(default = "default_log_path")]
    pub path: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            console_level: default_console_level(),
            file_level: default_file_level(),
            log: LogConfig::default(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            file: default_file_enabled(),
            rotate: false,
            path: default_log_path(),
        }
    }
}

fn default_name() -> String {
    "spotgazer".to_string()
}

fn default_console_level() -> String {
    "debug".to_string()
}

fn default_file_level() -> String {
    if cfg!(debug_assertions) {
        "debug".to_string()
    } else {
        "warn".to_string()
    }
}

fn default_file_enabled() -> bool {
    true
}

fn default_log_path() -> String {
    "logs/".to_string()
}

impl Default for SpotGazerConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            api: ApiConfig::default(),
            session: SessionConfig::default(),
            detector: DetectorConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl SpotGazerConfig {
    /// 从文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();

        if !path_ref.is_file() {
            return Err(ConfigError::FileNotFound {
                path: path_ref.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path_ref)?;
        Self::from_toml(&content)
    }

    /// 从 TOML 字符串加载配置
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// 仅从进程环境变量构造配置
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// 加载配置：提供文件时读文件，否则使用默认值；两种情况下环境变量都会覆盖对应字段
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env()?;
        Ok(config)
    }

    /// 使用进程环境变量覆盖配置
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// 使用给定的查找函数覆盖配置，空值视为未设置
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get(ENV_API_URL) {
            self.api.base_url = url.trim().to_string();
        }
        if let Some(username) = get(ENV_USERNAME) {
            self.api.username = username;
        }
        if let Some(password) = get(ENV_PASSWORD) {
            self.api.password = password;
        }
        if let Some(raw) = get(ENV_SESSION_DURATION) {
            self.session.duration_secs = parse_env(ENV_SESSION_DURATION, &raw)?;
        }
        if let Some(raw) = get(ENV_MAX_STREAMS) {
            self.session.max_streams = parse_env(ENV_MAX_STREAMS, &raw)?;
        }
        if let Some(level) = get(ENV_CONSOLE_LOG_LEVEL) {
            self.observability.console_level = level.to_lowercase();
        }
        if let Some(level) = get(ENV_FILE_LOG_LEVEL) {
            self.observability.file_level = level.to_lowercase();
        }
        if let Some(path) = get(ENV_LOG_PATH) {
            self.observability.log.path = path;
        }
        if let Some(program) = get(ENV_DETECTOR_PROGRAM) {
            self.detector.program = program;
        }

        Ok(())
    }

    /// 验证配置有效性
    ///
    /// 返回所有发现的问题，以 "Warning:" 开头的条目不阻止启动
    pub fn validate(&self) -> std::result::Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.name.trim().is_empty() {
            errors.push("name cannot be empty".to_string());
        }
        errors.extend(self.api.validate());
        errors.extend(self.session.validate());
        errors.extend(self.detector.validate());

        if self.observability.log.file && self.observability.log.path.trim().is_empty() {
            errors.push("observability.log.path cannot be empty when file logging is on".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// 只保留阻止启动的问题
    pub fn critical_errors(problems: &[String]) -> Vec<String> {
        problems
            .iter()
            .filter(|p| !p.starts_with("Warning:"))
            .cloned()
            .collect()
    }

    /// 验证并在存在非警告问题时失败
    pub fn ensure_valid(&self) -> Result<()> {
        match self.validate() {
            Ok(()) => Ok(()),
            Err(problems) => {
                let critical = Self::critical_errors(&problems);
                if critical.is_empty() {
                    Ok(())
                } else {
                    Err(ConfigError::Invalid(critical))
                }
            }
        }
    }

    /// 将配置序列化为 TOML 字符串
    pub fn to_toml(&self) -> std::result::Result<String, toml::ser::Error> {
        toml::to_string(self)
    }
}

fn parse_env<T: std::str::FromStr>(var: &str, raw: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::EnvError {
        var: var.to_string(),
        message: e.to_string(),
    })
}
