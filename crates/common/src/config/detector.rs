use serde::{Deserialize, Serialize};

/// 外部检测程序与分享链接解析器配置
///
/// 检测程序以视频地址为最后一个参数启动，每帧向 stdout 写一行 JSON：`{"vehicles": N}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// 检测程序路径
    #[serde(default = "default_program")]
    pub program: String,

    /// 位于视频地址之前的额外参数
    #[serde(default)]
    pub args: Vec<String>,

    /// 分享链接解析程序（yt-dlp 兼容）
    #[serde(default = "default_resolver_program")]
    pub resolver_program: String,

    /// 需要先解析成直连地址的分享链接主机
    #[serde(default = "default_share_link_hosts")]
    pub share_link_hosts: Vec<String>,
}

fn default_program() -> String {
    "spotgazer-detect".to_string()
}

fn default_resolver_program() -> String {
    "yt-dlp".to_string()
}

fn default_share_link_hosts() -> Vec<String> {
    vec!["youtube.com".to_string(), "youtu.be".to_string()]
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: Vec::new(),
            resolver_program: default_resolver_program(),
            share_link_hosts: default_share_link_hosts(),
        }
    }
}

impl DetectorConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.program.trim().is_empty() {
            errors.push("detector.program cannot be empty".to_string());
        }
        if self.resolver_program.trim().is_empty() && !self.share_link_hosts.is_empty() {
            errors.push(
                "Warning: detector.resolver_program is empty, share links will be deactivated"
                    .to_string(),
            );
        }
        errors
    }
}
