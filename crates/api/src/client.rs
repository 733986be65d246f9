//! JWT 认证客户端
//!
//! 令牌状态放在一把异步互斥锁之后：同一时刻最多只有一次登录/刷新请求在途，
//! 其余调用者等待并直接使用其结果。

use crate::error::{ApiError, Result};
use crate::token::TokenState;
use chrono::{DateTime, Utc};
use reqwest::{Method, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use spotgazer_common::ApiConfig;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

/// 认证请求的种类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Get,
    Post,
    Patch,
}

/// 请求参数的放置位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    Query,
    JsonBody,
}

impl RequestKind {
    fn route(self) -> (Method, Placement) {
        match self {
            RequestKind::Get => (Method::GET, Placement::Query),
            RequestKind::Post => (Method::POST, Placement::JsonBody),
            RequestKind::Patch => (Method::PATCH, Placement::JsonBody),
        }
    }
}

/// 刷新流程的下一步
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RefreshStep {
    /// 从未登录或 refresh 令牌过期：用户名密码完整登录
    Login,
    /// access 令牌过期或即将过期：用 refresh 令牌换新的 access
    Refresh,
    /// 当前 access 令牌仍然有效
    Keep,
}

impl RefreshStep {
    pub(crate) fn decide(state: Option<&TokenState>, now: DateTime<Utc>) -> Self {
        match state {
            None => RefreshStep::Login,
            Some(state) if state.refresh_expired(now) => RefreshStep::Login,
            Some(state) if state.access_expired(now) => RefreshStep::Refresh,
            Some(_) => RefreshStep::Keep,
        }
    }
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(serde::Deserialize)]
struct TokenPair {
    access: String,
    refresh: String,
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh: &'a str,
}

#[derive(serde::Deserialize)]
struct AccessToken {
    access: String,
}

/// SpotGazer API 的 JWT 客户端
pub struct JwtClient {
    base_url: Url,
    token_url: Url,
    refresh_url: Url,
    username: String,
    password: String,
    http: reqwest::Client,
    tokens: Mutex<Option<TokenState>>,
    closed: AtomicBool,
}

impl std::fmt::Debug for JwtClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtClient")
            .field("base_url", &self.base_url.as_str())
            .field("username", &self.username)
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl JwtClient {
    /// 创建新的客户端，不发起任何网络请求
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let base_url = Url::parse(config.base_url.trim_end_matches('/'))
            .map_err(|e| ApiError::InvalidUrl(format!("{}: {e}", config.base_url)))?;

        Ok(Self {
            token_url: join_path(&base_url, &config.token_path)?,
            refresh_url: join_path(&base_url, &config.token_refresh_path)?,
            base_url,
            username: config.username.clone(),
            password: config.password.clone(),
            http,
            tokens: Mutex::new(None),
            closed: AtomicBool::new(false),
        })
    }

    /// 确保持有有效的 access 令牌并返回它
    ///
    /// 从未登录或 refresh 令牌过期时完整登录；仅 access 过期时刷新；否则不发请求。
    pub async fn refresh_tokens(&self) -> Result<String> {
        let mut tokens = self.tokens.lock().await;
        if self.is_closed() {
            return Err(ApiError::Closed);
        }

        match RefreshStep::decide(tokens.as_ref(), Utc::now()) {
            RefreshStep::Login => {
                let pair = self.login().await?;
                *tokens = Some(TokenState::new(pair.access, pair.refresh)?);
                info!("Logged in to {} as {}", self.base_url, self.username);
            }
            RefreshStep::Refresh => {
                if let Some(state) = tokens.as_mut() {
                    let access = self.refresh(state.refresh_token()).await?;
                    state.replace_access(access)?;
                    debug!("Access token refreshed");
                }
            }
            RefreshStep::Keep => {}
        }

        tokens
            .as_ref()
            .map(|state| state.access_token().to_string())
            .ok_or_else(|| ApiError::Authentication("no token obtained".to_string()))
    }

    /// 当前令牌对的过期时间 (access, refresh)，尚未登录时为 None
    pub async fn token_expiry(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        self.tokens.lock().await.as_ref().map(TokenState::expiries)
    }

    /// 发送认证请求，非 2xx 响应转换为错误
    ///
    /// 服务端以 401 拒绝令牌时作废该令牌并重试一次；再次 401 则作为普通 HTTP 错误返回。
    pub async fn request<P>(&self, kind: RequestKind, path: &str, payload: &P) -> Result<Response>
    where
        P: Serialize + ?Sized,
    {
        let url = join_path(&self.base_url, path)?;
        let (method, placement) = kind.route();

        let access = self.refresh_tokens().await?;
        match self
            .send_authorized(method.clone(), &url, placement, &access, payload)
            .await
        {
            Err(ApiError::Http { status: 401, .. }) => {
                warn!("{} {} rejected the access token, retrying once", method, url);
                self.invalidate_access(&access).await;
                let access = self.refresh_tokens().await?;
                self.send_authorized(method, &url, placement, &access, payload)
                    .await
            }
            other => other,
        }
    }

    /// 发送认证请求并解码 JSON 响应
    pub async fn request_json<T, P>(&self, kind: RequestKind, path: &str, payload: &P) -> Result<T>
    where
        T: DeserializeOwned,
        P: Serialize + ?Sized,
    {
        Ok(self.request(kind, path, payload).await?.json().await?)
    }

    /// 释放会话：丢弃令牌，此后的请求返回 `Closed`；可重复调用
    pub async fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.tokens.lock().await.take();
            info!("API client session closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn send_authorized<P>(
        &self,
        method: Method,
        url: &Url,
        placement: Placement,
        access: &str,
        payload: &P,
    ) -> Result<Response>
    where
        P: Serialize + ?Sized,
    {
        debug!("{} {}", method, url);
        let builder = self.http.request(method, url.clone()).bearer_auth(access);
        let builder = match placement {
            Placement::Query => builder.query(payload),
            Placement::JsonBody => builder.json(payload),
        };

        ensure_success(builder.send().await?).await
    }

    async fn invalidate_access(&self, rejected: &str) {
        if let Some(state) = self.tokens.lock().await.as_mut() {
            if state.invalidate_access(rejected) {
                debug!("Access token invalidated");
            }
        }
    }

    async fn login(&self) -> Result<TokenPair> {
        let body = LoginRequest {
            username: &self.username,
            password: &self.password,
        };
        self.post_unauthenticated(&self.token_url, &body).await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<String> {
        let body = RefreshRequest {
            refresh: refresh_token,
        };
        let token: AccessToken = self.post_unauthenticated(&self.refresh_url, &body).await?;
        Ok(token.access)
    }

    async fn post_unauthenticated<B, T>(&self, url: &Url, body: &B) -> Result<T>
    where
        B: Serialize,
        T: DeserializeOwned,
    {
        let response = self
            .http
            .post(url.clone())
            .json(body)
            .send()
            .await
            .map_err(|e| ApiError::Authentication(format!("{url}: {e}")))?;

        let response = ensure_success(response).await.map_err(|e| {
            warn!("Token endpoint rejected the request: {}", e);
            ApiError::Authentication(e.to_string())
        })?;

        response
            .json()
            .await
            .map_err(|e| ApiError::Authentication(format!("unexpected token response: {e}")))
    }
}

fn join_path(base: &Url, path: &str) -> Result<Url> {
    let joined = format!(
        "{}/{}",
        base.as_str().trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    Url::parse(&joined).map_err(|e| ApiError::InvalidUrl(format!("{joined}: {e}")))
}

async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let url = response.url().to_string();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<no body>".to_string());
    Err(ApiError::Http {
        status: status.as_u16(),
        url,
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
    use chrono::Duration as ChronoDuration;

    fn token_expiring_at(exp: DateTime<Utc>) -> String {
        format!(
            "{}.{}.sig",
            URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256"}"#),
            URL_SAFE_NO_PAD.encode(format!(r#"{{"exp":{}}}"#, exp.timestamp()))
        )
    }

    fn state(access_in: ChronoDuration, refresh_in: ChronoDuration) -> TokenState {
        let now = Utc::now();
        TokenState::new(
            token_expiring_at(now + access_in),
            token_expiring_at(now + refresh_in),
        )
        .unwrap()
    }

    #[test]
    fn test_first_call_logs_in() {
        assert_eq!(RefreshStep::decide(None, Utc::now()), RefreshStep::Login);
    }

    #[test]
    fn test_expired_refresh_token_logs_in() {
        let s = state(ChronoDuration::hours(-2), ChronoDuration::hours(-1));
        assert_eq!(RefreshStep::decide(Some(&s), Utc::now()), RefreshStep::Login);
    }

    #[test]
    fn test_expired_access_token_refreshes() {
        let s = state(ChronoDuration::minutes(-1), ChronoDuration::hours(24));
        assert_eq!(
            RefreshStep::decide(Some(&s), Utc::now()),
            RefreshStep::Refresh
        );
    }

    #[test]
    fn test_valid_tokens_are_kept() {
        let s = state(ChronoDuration::minutes(5), ChronoDuration::hours(24));
        assert_eq!(RefreshStep::decide(Some(&s), Utc::now()), RefreshStep::Keep);
    }

    #[test]
    fn test_request_kind_routes() {
        assert_eq!(RequestKind::Get.route(), (Method::GET, Placement::Query));
        assert_eq!(RequestKind::Post.route(), (Method::POST, Placement::JsonBody));
        assert_eq!(
            RequestKind::Patch.route(),
            (Method::PATCH, Placement::JsonBody)
        );
    }

    #[test]
    fn test_join_path() {
        let base = Url::parse("https://spotgazer.example.com/backend").unwrap();
        assert_eq!(
            join_path(&base, "/api/token/").unwrap().as_str(),
            "https://spotgazer.example.com/backend/api/token/"
        );
    }

    #[test]
    fn test_client_creation() {
        let config = ApiConfig {
            base_url: "https://spotgazer.example.com/".to_string(),
            username: "vision".to_string(),
            password: "secret".to_string(),
            ..Default::default()
        };
        let client = JwtClient::new(&config).unwrap();
        assert_eq!(client.token_url.as_str(), "https://spotgazer.example.com/api/token/");
        assert!(!format!("{client:?}").contains("secret"));
    }

    #[test]
    fn test_client_rejects_bad_url() {
        let config = ApiConfig {
            base_url: "::not a url".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            JwtClient::new(&config),
            Err(ApiError::InvalidUrl(_))
        ));
    }
}
