use crate::error::ErrorBody;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use dashmap::DashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

const WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RateLimitDecision {
    Allowed { remaining: u32 },
    Denied { retry_after: Duration },
}

#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

#[derive(Debug)]
pub struct RateLimiter {
    per_minute: u32,
    trust_forwarded: bool,
    buckets: DashMap<String, TokenBucket>,
}

impl RateLimiter {
    /// `0` disables limiting. `X-Forwarded-For` is only read when
    /// `trust_forwarded` is set, i.e. behind a proxy that overwrites it.
    pub fn new(per_minute: u32, trust_forwarded: bool) -> Self {
        Self {
            per_minute,
            trust_forwarded,
            buckets: DashMap::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.per_minute > 0
    }

    pub fn check(&self, client_key: &str) -> RateLimitDecision {
        self.check_at(client_key, Instant::now())
    }

    fn check_at(&self, client_key: &str, now: Instant) -> RateLimitDecision {
        if !self.is_enabled() {
            return RateLimitDecision::Allowed {
                remaining: u32::MAX,
            };
        }

        let capacity = f64::from(self.per_minute);
        let mut bucket = self
            .buckets
            .entry(client_key.to_string())
            .or_insert_with(|| TokenBucket {
                tokens: capacity,
                last_refill: now,
            });

        let elapsed = now.saturating_duration_since(bucket.last_refill);
        let refill = elapsed.as_secs_f64() / WINDOW.as_secs_f64() * capacity;
        bucket.tokens = (bucket.tokens + refill).min(capacity);
        bucket.last_refill = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            RateLimitDecision::Allowed {
                remaining: bucket.tokens as u32,
            }
        } else {
            let missing = 1.0 - bucket.tokens;
            RateLimitDecision::Denied {
                retry_after: Duration::from_secs_f64(missing / capacity * WINDOW.as_secs_f64()),
            }
        }
    }

    // Idle buckets are full again and can be dropped.
    pub fn prune_idle(&self) {
        let now = Instant::now();
        self.buckets
            .retain(|_, bucket| now.saturating_duration_since(bucket.last_refill) < WINDOW);
    }

    #[cfg(test)]
    fn tracked_clients(&self) -> usize {
        self.buckets.len()
    }

    fn client_key(&self, request: &Request) -> String {
        if self.trust_forwarded {
            let forwarded = request
                .headers()
                .get("x-forwarded-for")
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.split(',').next())
                .and_then(|value| value.trim().parse::<IpAddr>().ok());
            if let Some(ip) = forwarded {
                return ip.to_string();
            }
        }

        request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }
}

fn too_many_requests(retry_after: Duration) -> Response {
    let seconds = retry_after.as_secs_f64().ceil().max(1.0) as u64;
    let mut response = (
        StatusCode::TOO_MANY_REQUESTS,
        Json(ErrorBody {
            error: "rate limit exceeded".to_string(),
        }),
    )
        .into_response();
    response
        .headers_mut()
        .insert(header::RETRY_AFTER, HeaderValue::from(seconds));
    response
}

pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    if !limiter.is_enabled() {
        return next.run(request).await;
    }

    let client = limiter.client_key(&request);
    match limiter.check(&client) {
        RateLimitDecision::Allowed { remaining } => {
            let mut response = next.run(request).await;
            response
                .headers_mut()
                .insert("x-ratelimit-remaining", HeaderValue::from(remaining));
            response
        }
        RateLimitDecision::Denied { retry_after } => {
            tracing::debug!(%client, ?retry_after, "rate limit exceeded");
            too_many_requests(retry_after)
        }
    }
}
