//! Basic 认证与按客户端地址的失败限流。

use axum::extract::Extension;
use axum::http::{HeaderMap, Method, Request, header};
use axum::{body::Body as AxumBody, middleware};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Basic};
use std::collections::{HashMap, VecDeque};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::device::identify_device;
use crate::error::ApiError;
use crate::http::client_ip;

/// 单一账号的认证闸门；失败记录按客户端地址保存在滑动窗口内。
#[derive(Debug)]
pub struct AuthGate {
    username: String,
    password: String,
    failures: Mutex<HashMap<IpAddr, VecDeque<Instant>>>,
    window: Duration,
    max_failures: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStatus {
    Granted,
    /// 缺失、格式错误或不匹配的凭据都计入失败次数。
    Rejected { attempts: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthResult {
    pub client: IpAddr,
    pub status: AuthStatus,
}

impl AuthResult {
    pub fn is_granted(&self) -> bool {
        self.status == AuthStatus::Granted
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimit {
    Allowed,
    Limited { retry_after: Duration },
}

impl AuthGate {
    pub fn new(username: String, password: String, window: Duration, max_failures: usize) -> Self {
        Self {
            username,
            password,
            failures: Mutex::new(HashMap::new()),
            window,
            max_failures,
        }
    }

    /// 校验 Basic 凭据；失败时记录时间戳，成功时清空该客户端的失败记录。
    pub async fn authenticate(&self, headers: &HeaderMap, client: IpAddr) -> AuthResult {
        let granted = headers
            .typed_get::<Authorization<Basic>>()
            .is_some_and(|auth| auth.username() == self.username && auth.password() == self.password);

        let status = if granted {
            self.clear_failures(client).await;
            AuthStatus::Granted
        } else {
            let attempts = self.record_failure(client).await;
            warn!(client_ip = %client, attempts, "authentication failed");
            AuthStatus::Rejected { attempts }
        };
        AuthResult { client, status }
    }

    /// 窗口内失败次数达到阈值时拒绝，并给出最早一条记录过期的剩余时间。
    pub async fn check_rate_limit(&self, client: IpAddr) -> RateLimit {
        if self.max_failures == 0 {
            return RateLimit::Allowed;
        }

        let mut failures = self.failures.lock().await;
        let now = Instant::now();
        let Some(entry) = failures.get_mut(&client) else {
            return RateLimit::Allowed;
        };
        prune(entry, now, self.window);
        if entry.is_empty() {
            failures.remove(&client);
            return RateLimit::Allowed;
        }
        if entry.len() < self.max_failures {
            return RateLimit::Allowed;
        }

        let retry_after = entry
            .front()
            .map(|oldest| (*oldest + self.window).saturating_duration_since(now))
            .unwrap_or_default();
        RateLimit::Limited { retry_after }
    }

    async fn record_failure(&self, client: IpAddr) -> usize {
        let mut failures = self.failures.lock().await;
        let now = Instant::now();
        let entry = failures.entry(client).or_default();
        prune(entry, now, self.window);
        entry.push_back(now);
        entry.len()
    }

    async fn clear_failures(&self, client: IpAddr) {
        let mut failures = self.failures.lock().await;
        failures.remove(&client);
    }

    /// 清理所有已完全过期的客户端记录。
    pub async fn prune_stale(&self) -> usize {
        let mut failures = self.failures.lock().await;
        let now = Instant::now();
        let before = failures.len();
        failures.retain(|_, entry| {
            prune(entry, now, self.window);
            !entry.is_empty()
        });
        before - failures.len()
    }

    #[cfg(test)]
    pub async fn tracked_clients(&self) -> usize {
        self.failures.lock().await.len()
    }
}

fn prune(entry: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while entry
        .front()
        .is_some_and(|ts| now.saturating_duration_since(*ts) >= window)
    {
        entry.pop_front();
    }
}

/// 认证中间件：先做限流判定，再校验凭据。
pub async fn auth_middleware(
    Extension(gate): Extension<Arc<AuthGate>>,
    req: Request<AxumBody>,
    next: middleware::Next,
) -> Result<axum::response::Response, ApiError> {
    let client = client_ip(&req);

    if let RateLimit::Limited { retry_after } = gate.check_rate_limit(client).await {
        warn!(client_ip = %client, "too many failed attempts");
        return Err(ApiError::TooManyRequests(retry_after.as_secs().max(1)));
    }

    let result = gate.authenticate(req.headers(), client).await;
    if !result.is_granted() {
        if let AuthStatus::Rejected { attempts } = result.status
            && gate.max_failures > 0
            && attempts >= gate.max_failures
        {
            warn!(client_ip = %result.client, attempts, "client reached failure limit");
        }
        return Err(ApiError::Unauthorized);
    }

    if req.method() == Method::GET {
        let user_agent = req
            .headers()
            .get(header::USER_AGENT)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("unknown");
        info!(client_ip = %client, device = %identify_device(user_agent), "request");
    }

    Ok(next.run(req).await)
}
