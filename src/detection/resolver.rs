//! 分享链接解析
//!
//! 视频平台的分享页不能直接解码，需要先换成直连的媒体地址。

use async_trait::async_trait;
use spotgazer_common::DetectorConfig;
use std::fmt::Debug;
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;
use url::Url;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("{program} failed for {link}: {message}")]
    Failed {
        program: String,
        link: String,
        message: String,
    },

    #[error("cannot run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

#[async_trait]
pub trait SourceResolver: Send + Sync + Debug {
    /// 该地址是否为需要解析的分享链接
    fn needs_resolution(&self, stream_source: &str) -> bool;

    /// 把分享链接换成可以直接打开的媒体地址
    async fn resolve(&self, stream_source: &str) -> Result<String, ResolveError>;
}

/// 调用 yt-dlp 兼容程序：`<program> -f best -g <link>`，取 stdout 第一行
#[derive(Debug, Clone)]
pub struct YtDlpResolver {
    program: String,
    hosts: Vec<String>,
}

impl YtDlpResolver {
    pub fn new(program: impl Into<String>, hosts: Vec<String>) -> Self {
        Self {
            program: program.into(),
            hosts,
        }
    }

    pub fn from_config(config: &DetectorConfig) -> Self {
        Self::new(
            config.resolver_program.clone(),
            config.share_link_hosts.clone(),
        )
    }

    fn host_matches(&self, host: &str) -> bool {
        let host = host.trim_start_matches("www.");
        self.hosts.iter().any(|known| {
            host == known.as_str()
                || host
                    .strip_suffix(known.as_str())
                    .is_some_and(|prefix| prefix.ends_with('.'))
        })
    }
}

#[async_trait]
impl SourceResolver for YtDlpResolver {
    fn needs_resolution(&self, stream_source: &str) -> bool {
        Url::parse(stream_source)
            .ok()
            .and_then(|url| url.host_str().map(|h| self.host_matches(h)))
            .unwrap_or(false)
    }

    async fn resolve(&self, stream_source: &str) -> Result<String, ResolveError> {
        let output = Command::new(&self.program)
            .args(["-f", "best", "-g", stream_source])
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| ResolveError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let failed = |message: String| ResolveError::Failed {
            program: self.program.clone(),
            link: stream_source.to_string(),
            message,
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(failed(format!("{}: {}", output.status, stderr.trim())));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let resolved = stdout
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .ok_or_else(|| failed("no media url printed".to_string()))?;

        debug!("Resolved {} to a direct media url", stream_source);
        Ok(resolved.to_string())
    }
}
