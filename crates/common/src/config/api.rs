use serde::{Deserialize, Serialize};
use url::Url;

/// 后端 API 客户端配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// 后端服务根地址，例如 "https://spotgazer.example.com"
    #[serde(default)]
    pub base_url: String,

    /// 服务账号用户名
    #[serde(default)]
    pub username: String,

    /// 服务账号密码
    #[serde(default)]
    pub password: String,

    /// 登录接口路径（用户名/密码换取 access + refresh）
    #[serde(default = "default_token_path")]
    pub token_path: String,

    /// 刷新接口路径（refresh 换取新的 access）
    #[serde(default = "default_token_refresh_path")]
    pub token_refresh_path: String,

    /// 请求超时时间（秒）
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_token_path() -> String {
    "/api/token/".to_string()
}

fn default_token_refresh_path() -> String {
    "/api/token/refresh/".to_string()
}

fn default_timeout() -> u64 {
    30
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            username: String::new(),
            password: String::new(),
            token_path: default_token_path(),
            token_refresh_path: default_token_refresh_path(),
            timeout_secs: default_timeout(),
        }
    }
}

impl ApiConfig {
    /// 验证配置有效性，返回发现的问题列表
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.base_url.trim().is_empty() {
            errors.push("api.base_url (SPOTGAZER_URL) is required".to_string());
        } else {
            match Url::parse(&self.base_url) {
                Ok(url) if url.scheme() == "http" => errors.push(format!(
                    "Warning: api.base_url uses plain HTTP, credentials are sent unencrypted: {}",
                    self.base_url
                )),
                Ok(url) if url.scheme() != "https" => errors.push(format!(
                    "api.base_url must be an http(s) URL, got scheme '{}'",
                    url.scheme()
                )),
                Ok(_) => {}
                Err(e) => errors.push(format!("api.base_url is not a valid URL: {e}")),
            }
        }

        if self.username.trim().is_empty() {
            errors.push("api.username (SERVICE_USERNAME) is required".to_string());
        }
        if self.password.is_empty() {
            errors.push("api.password (SERVICE_PASSWORD) is required".to_string());
        }
        if self.timeout_secs == 0 {
            errors.push("api.timeout_secs must be greater than 0".to_string());
        }

        errors
    }
}
