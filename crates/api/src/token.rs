//! JWT 令牌状态
//!
//! 只解码载荷中的 `exp` 字段以得到过期时间，不校验签名

use crate::error::{ApiError, Result};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, TimeDelta, Utc};
use serde::Deserialize;
use std::fmt;

/// 令牌在到期前这段时间内即视为过期，避免请求在途中失效
pub(crate) const EXPIRY_LEEWAY_SECS: i64 = 30;

#[derive(Deserialize)]
struct ExpiryClaim {
    exp: f64,
}

/// 当前持有的令牌对
///
/// 仅存在于 `JwtClient` 内部，只在刷新流程中被修改
pub(crate) struct TokenState {
    access_token: String,
    refresh_token: String,
    access_expiry: DateTime<Utc>,
    refresh_expiry: DateTime<Utc>,
}

impl TokenState {
    pub(crate) fn new(access_token: String, refresh_token: String) -> Result<Self> {
        let access_expiry = decode_expiry(&access_token)?;
        let refresh_expiry = decode_expiry(&refresh_token)?;
        Ok(Self {
            access_token,
            refresh_token,
            access_expiry,
            refresh_expiry,
        })
    }

    /// 替换 access 令牌，refresh 令牌保持不变
    pub(crate) fn replace_access(&mut self, access_token: String) -> Result<()> {
        self.access_expiry = decode_expiry(&access_token)?;
        self.refresh_expiry = decode_expiry(&self.refresh_token)?;
        self.access_token = access_token;
        Ok(())
    }

    pub(crate) fn access_token(&self) -> &str {
        &self.access_token
    }

    pub(crate) fn refresh_token(&self) -> &str {
        &self.refresh_token
    }

    pub(crate) fn access_expired(&self, now: DateTime<Utc>) -> bool {
        now + TimeDelta::seconds(EXPIRY_LEEWAY_SECS) >= self.access_expiry
    }

    pub(crate) fn refresh_expired(&self, now: DateTime<Utc>) -> bool {
        now + TimeDelta::seconds(EXPIRY_LEEWAY_SECS) >= self.refresh_expiry
    }

    /// 服务端拒绝了 `rejected` 时把它标记为过期；令牌已被其他调用者换新则不做任何事
    pub(crate) fn invalidate_access(&mut self, rejected: &str) -> bool {
        if self.access_token != rejected {
            return false;
        }
        self.access_expiry = DateTime::<Utc>::MIN_UTC;
        true
    }

    pub(crate) fn expiries(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        (self.access_expiry, self.refresh_expiry)
    }
}

impl fmt::Debug for TokenState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenState")
            .field("access_expiry", &self.access_expiry)
            .field("refresh_expiry", &self.refresh_expiry)
            .finish_non_exhaustive()
    }
}

/// 从 JWT 载荷中提取过期时间
pub(crate) fn decode_expiry(token: &str) -> Result<DateTime<Utc>> {
    let mut segments = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(ApiError::TokenDecode(
            "expected three dot-separated segments".to_string(),
        ));
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| ApiError::TokenDecode(format!("payload is not base64url: {e}")))?;
    let claim: ExpiryClaim = serde_json::from_slice(&bytes)
        .map_err(|e| ApiError::TokenDecode(format!("payload has no numeric exp: {e}")))?;

    let secs = claim.exp.floor();
    let nanos = ((claim.exp - secs) * 1_000_000_000.0) as u32;
    DateTime::from_timestamp(secs as i64, nanos)
        .ok_or_else(|| ApiError::TokenDecode(format!("exp out of range: {}", claim.exp)))
}
