//! 基于外部进程的检测能力
//!
//! 每个视频源启动一个检测进程，视频地址作为最后一个参数；
//! 进程每处理一帧向 stdout 输出一行 `{"vehicles": N}`，退出即序列结束。

use super::{Detection, DetectionEngine, DetectionError, DetectionStream};
use async_trait::async_trait;
use spotgazer_common::DetectorConfig;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::process::{Child, ChildStdout, Command};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct CommandDetector {
    program: String,
    args: Vec<String>,
}

impl CommandDetector {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn from_config(config: &DetectorConfig) -> Self {
        Self::new(config.program.clone(), config.args.clone())
    }
}

#[async_trait]
impl DetectionEngine for CommandDetector {
    async fn open(&self, stream_source: &str) -> Result<Box<dyn DetectionStream>, DetectionError> {
        let open_error = |reason: String| DetectionError::Open {
            stream_source: stream_source.to_string(),
            reason,
        };

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(stream_source)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| open_error(format!("failed to spawn {}: {e}", self.program)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| open_error("detector stdout not captured".to_string()))?;

        debug!(
            "Detector {} started for {} (pid {:?})",
            self.program,
            stream_source,
            child.id()
        );

        Ok(Box::new(CommandStream {
            stream_source: stream_source.to_string(),
            child,
            lines: BufReader::new(stdout).lines(),
            closed: false,
        }))
    }
}

#[derive(Debug)]
struct CommandStream {
    stream_source: String,
    child: Child,
    lines: Lines<BufReader<ChildStdout>>,
    closed: bool,
}

#[async_trait]
impl DetectionStream for CommandStream {
    async fn next_detection(&mut self) -> Result<Option<Detection>, DetectionError> {
        if self.closed {
            return Ok(None);
        }

        loop {
            let line = self
                .lines
                .next_line()
                .await
                .map_err(|e| DetectionError::Connectivity(format!("{}: {e}", self.stream_source)))?;

            let Some(line) = line else {
                return Ok(None);
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            return serde_json::from_str(line)
                .map(Some)
                .map_err(|e| DetectionError::Malformed(format!("{line:?}: {e}")));
        }
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        if let Err(e) = self.child.start_kill() {
            debug!("Detector for {} already exited: {}", self.stream_source, e);
        }
        match self.child.wait().await {
            Ok(status) => debug!("Detector for {} stopped: {}", self.stream_source, status),
            Err(e) => warn!("Failed to reap detector for {}: {}", self.stream_source, e),
        }
    }
}
