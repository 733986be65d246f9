use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 会话与监督循环配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// 单次会话时长（秒），同时作为发现接口的租约截止时间
    #[serde(default = "default_duration")]
    pub duration_secs: u64,

    /// 单次会话最多领取的停车场数量
    #[serde(default = "default_max_streams")]
    pub max_streams: u32,

    /// 连续异常退出的重试次数
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// 异常退出后的等待时间（秒）
    #[serde(default = "default_backoff")]
    pub backoff_secs: u64,

    /// stop 时等待停车场任务自行退出的时间（秒），超时后强制中止
    #[serde(default = "default_stop_grace")]
    pub stop_grace_secs: u64,

    /// 单帧检测结果的最长等待时间（秒）
    #[serde(default = "default_frame_timeout")]
    pub frame_timeout_secs: u64,
}

fn default_duration() -> u64 {
    30 * 60
}

fn default_max_streams() -> u32 {
    20
}

fn default_max_attempts() -> u32 {
    12
}

fn default_backoff() -> u64 {
    5
}

fn default_stop_grace() -> u64 {
    5
}

fn default_frame_timeout() -> u64 {
    60
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            duration_secs: default_duration(),
            max_streams: default_max_streams(),
            max_attempts: default_max_attempts(),
            backoff_secs: default_backoff(),
            stop_grace_secs: default_stop_grace(),
            frame_timeout_secs: default_frame_timeout(),
        }
    }
}

impl SessionConfig {
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_secs(self.backoff_secs)
    }

    pub fn stop_grace(&self) -> Duration {
        Duration::from_secs(self.stop_grace_secs)
    }

    pub fn frame_timeout(&self) -> Duration {
        Duration::from_secs(self.frame_timeout_secs)
    }

    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.duration_secs == 0 {
            errors.push("session.duration_secs must be greater than 0".to_string());
        }
        if self.max_streams == 0 {
            errors.push("session.max_streams must be greater than 0".to_string());
        }
        if self.max_attempts == 0 {
            errors.push("session.max_attempts must be greater than 0".to_string());
        }
        if self.frame_timeout_secs == 0 {
            errors.push("session.frame_timeout_secs must be greater than 0".to_string());
        }
        if self.frame_timeout_secs >= self.duration_secs {
            errors.push(format!(
                "Warning: session.frame_timeout_secs ({}) is not shorter than the session ({}s)",
                self.frame_timeout_secs, self.duration_secs
            ));
        }

        errors
    }
}
