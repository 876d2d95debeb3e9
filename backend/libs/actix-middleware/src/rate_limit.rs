use actix_web::{
    body::EitherBody,
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
    http::header::{HeaderMap, HeaderName, HeaderValue, RETRY_AFTER},
    Error, HttpResponse,
};
use dashmap::DashMap;
use futures::future::{ready, Ready};
use once_cell::sync::Lazy;
use prometheus::IntCounter;
use serde::Deserialize;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

/// Bucket used when the client address cannot be determined
pub const SHARED_BUCKET: &str = "unknown";

const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

static RATE_LIMIT_REJECTIONS: Lazy<IntCounter> = Lazy::new(|| {
    let counter = IntCounter::new(
        "gatekeeper_rate_limit_rejections_total",
        "Requests rejected by the sliding-window rate limiter",
    )
    .expect("failed to create gatekeeper_rate_limit_rejections_total");
    if let Err(e) = prometheus::default_registry().register(Box::new(counter.clone())) {
        warn!(error = %e, "Failed to register rate limit metric");
    }
    counter
});

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window_seconds: u64,
    /// Key on `Forwarded`/`X-Forwarded-For` instead of the socket peer.
    /// Only safe behind a proxy that overwrites those headers.
    #[serde(default)]
    pub trust_forwarded_headers: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 100,
            window_seconds: 900, // 15 minutes
            trust_forwarded_headers: false,
        }
    }
}

/// Budget left after an allowed request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitStatus {
    pub limit: u32,
    pub remaining: u32,
    /// Time until the oldest request in the window ages out
    pub reset_after: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Rate limit exceeded: {limit} requests per window, retry after {retry_after_secs}s")]
pub struct RateLimitExceeded {
    pub limit: u32,
    pub retry_after_secs: u64,
}

/// Per-identifier request log pruned to the trailing window on every check.
///
/// Memory is proportional to the request rate of each identifier within one
/// window; identifiers with no recent requests are dropped by [`sweep`].
///
/// [`sweep`]: SlidingWindowLimiter::sweep
#[derive(Debug)]
pub struct SlidingWindowLimiter {
    window: Duration,
    max_requests: u32,
    windows: DashMap<String, VecDeque<Instant>>,
}

impl SlidingWindowLimiter {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            window,
            max_requests,
            windows: DashMap::new(),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(
            Duration::from_secs(config.window_seconds),
            config.max_requests,
        )
    }

    pub fn limit(&self) -> u32 {
        self.max_requests
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn check(&self, identifier: &str) -> Result<RateLimitStatus, RateLimitExceeded> {
        self.check_at(identifier, Instant::now())
    }

    pub fn check_at(
        &self,
        identifier: &str,
        now: Instant,
    ) -> Result<RateLimitStatus, RateLimitExceeded> {
        let key = match identifier.trim() {
            "" => SHARED_BUCKET,
            id => id,
        };

        let mut requests = self.windows.entry(key.to_string()).or_default();
        prune(&mut requests, now, self.window);

        if (requests.len() as u64) < u64::from(self.max_requests) {
            requests.push_back(now);
            let oldest = requests.front().copied().unwrap_or(now);
            return Ok(RateLimitStatus {
                limit: self.max_requests,
                remaining: self.max_requests - requests.len() as u32,
                reset_after: self.window.saturating_sub(now.duration_since(oldest)),
            });
        }

        let wait = requests
            .front()
            .map(|oldest| self.window.saturating_sub(now.duration_since(*oldest)))
            .unwrap_or(self.window);

        Err(RateLimitExceeded {
            limit: self.max_requests,
            retry_after_secs: ceil_secs(wait).max(1),
        })
    }

    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    /// Drop identifiers whose windows hold no recent requests.
    pub fn sweep_at(&self, now: Instant) -> usize {
        let before = self.windows.len();
        self.windows.retain(|_, requests| {
            prune(requests, now, self.window);
            !requests.is_empty()
        });
        before.saturating_sub(self.windows.len())
    }

    pub fn tracked_identifiers(&self) -> usize {
        self.windows.len()
    }
}

fn prune(requests: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(oldest) = requests.front() {
        if now.duration_since(*oldest) >= window {
            requests.pop_front();
        } else {
            break;
        }
    }
}

fn ceil_secs(duration: Duration) -> u64 {
    let secs = duration.as_secs();
    if duration.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}

fn insert_limit_headers(headers: &mut HeaderMap, limit: u32, remaining: u32, reset_secs: u64) {
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(remaining));
    headers.insert(X_RATELIMIT_RESET, HeaderValue::from(reset_secs));
}

/// Client identifier for rate limiting: the socket peer IP, or the
/// proxy-reported address when forwarded headers are trusted.
pub fn client_identifier(req: &ServiceRequest, trust_forwarded_headers: bool) -> String {
    if trust_forwarded_headers {
        if let Some(addr) = req.connection_info().realip_remote_addr() {
            return addr.to_string();
        }
    }
    req.peer_addr()
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| SHARED_BUCKET.to_string())
}

pub struct RateLimitMiddleware {
    limiter: Arc<SlidingWindowLimiter>,
    trust_forwarded_headers: bool,
}

impl RateLimitMiddleware {
    pub fn new(limiter: Arc<SlidingWindowLimiter>) -> Self {
        Self {
            limiter,
            trust_forwarded_headers: false,
        }
    }

    pub fn trust_forwarded_headers(mut self, trust: bool) -> Self {
        self.trust_forwarded_headers = trust;
        self
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimitMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = RateLimitMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RateLimitMiddlewareService {
            service: Rc::new(service),
            limiter: self.limiter.clone(),
            trust_forwarded_headers: self.trust_forwarded_headers,
        }))
    }
}

pub struct RateLimitMiddlewareService<S> {
    service: Rc<S>,
    limiter: Arc<SlidingWindowLimiter>,
    trust_forwarded_headers: bool,
}

impl<S, B> Service<ServiceRequest> for RateLimitMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    actix_web::dev::forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let limiter = self.limiter.clone();
        let client = client_identifier(&req, self.trust_forwarded_headers);

        Box::pin(async move {
            match limiter.check(&client) {
                Ok(status) => {
                    debug!(%client, remaining = status.remaining, "Rate limit check passed");
                    let mut res = service.call(req).await?;
                    insert_limit_headers(
                        res.headers_mut(),
                        status.limit,
                        status.remaining,
                        ceil_secs(status.reset_after),
                    );
                    Ok(res.map_into_left_body())
                }
                Err(exceeded) => {
                    RATE_LIMIT_REJECTIONS.inc();
                    warn!(
                        %client,
                        path = %req.path(),
                        retry_after = exceeded.retry_after_secs,
                        "Rate limit exceeded"
                    );

                    let mut response = HttpResponse::TooManyRequests()
                        .insert_header((RETRY_AFTER, exceeded.retry_after_secs))
                        .json(serde_json::json!({
                            "error": "RATE_LIMITED",
                            "message": "Too many requests, please try again later",
                            "status": 429,
                            "retryAfter": exceeded.retry_after_secs,
                        }));
                    insert_limit_headers(
                        response.headers_mut(),
                        exceeded.limit,
                        0,
                        exceeded.retry_after_secs,
                    );

                    Ok(req.into_response(response).map_into_right_body())
                }
            }
        })
    }
}
