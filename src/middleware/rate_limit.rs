use crate::models::auth::ErrorResponse;
use axum::{
    extract::{ConnectInfo, Request},
    http::StatusCode,
    middleware::Next,
    response::{Json, Response},
};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::{Duration, Instant};

/// AI proxy calls allowed per client IP per window.
pub const AI_REQUESTS_PER_MINUTE: u32 = 20;

/// Fixed-window request counter keyed by client IP.
#[derive(Clone)]
pub struct RateLimiter {
    // IP -> (request_count, window_start)
    clients: Arc<Mutex<HashMap<String, (u32, Instant)>>>,
    max_requests: u32,
    window_duration: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window_duration: Duration) -> Self {
        Self {
            clients: Arc::new(Mutex::new(HashMap::new())),
            max_requests,
            window_duration,
        }
    }

    pub fn check_rate_limit(&self, client_ip: &str) -> bool {
        let mut clients = self.clients.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let now = Instant::now();

        match clients.get_mut(client_ip) {
            Some((count, window_start)) => {
                if now.duration_since(*window_start) > self.window_duration {
                    *count = 1;
                    *window_start = now;
                    true
                } else if *count >= self.max_requests {
                    false
                } else {
                    *count += 1;
                    true
                }
            }
            None => {
                clients.insert(client_ip.to_string(), (1, now));
                true
            }
        }
    }

    pub fn cleanup_expired(&self) {
        let mut clients = self.clients.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let now = Instant::now();
        clients.retain(|_, (_, window_start)| now.duration_since(*window_start) <= self.window_duration);
    }

    fn tracked_clients(&self) -> usize {
        self.clients.lock().map(|c| c.len()).unwrap_or(0)
    }
}

/// Limits the LLM-backed routes, which cost money per call.
pub async fn ai_rate_limit_middleware(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Result<Response, (StatusCode, Json<ErrorResponse>)> {
    static AI_RATE_LIMITER: OnceLock<RateLimiter> = OnceLock::new();
    let rate_limiter =
        AI_RATE_LIMITER.get_or_init(|| RateLimiter::new(AI_REQUESTS_PER_MINUTE, Duration::from_secs(60)));

    let client_ip = addr.ip().to_string();

    if !rate_limiter.check_rate_limit(&client_ip) {
        tracing::warn!("AI rate limit exceeded for IP: {}", client_ip);
        return Err((
            StatusCode::TOO_MANY_REQUESTS,
            Json(ErrorResponse::new("Too many assistant requests. Please try again in a minute.")),
        ));
    }

    // Occasionally clean up expired entries
    if rand::random::<u8>() < 10 {
        rate_limiter.cleanup_expired();
        tracing::debug!("AI rate limiter tracking {} clients", rate_limiter.tracked_clients());
    }

    Ok(next.run(request).await)
}
