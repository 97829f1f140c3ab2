use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use serde_json::json;
use std::{num::NonZeroU32, sync::Arc};

pub type AdminRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// `per_minute` steady rate with `burst` requests allowed up front.
/// Zero values are raised to one.
pub fn create_rate_limiter(per_minute: u32, burst: u32) -> AdminRateLimiter {
    let rate = NonZeroU32::new(per_minute).unwrap_or(NonZeroU32::MIN);
    let burst = NonZeroU32::new(burst).unwrap_or(NonZeroU32::MIN);
    Arc::new(RateLimiter::direct(Quota::per_minute(rate).allow_burst(burst)))
}

/// Middleware for `axum::middleware::from_fn_with_state`.
pub async fn limit_requests(
    State(limiter): State<AdminRateLimiter>,
    request: Request,
    next: Next,
) -> Response {
    if limiter.check().is_err() {
        tracing::warn!("⚠ Rate limit hit on {}", request.uri().path());
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({ "error": "Too many requests" })),
        )
            .into_response();
    }
    next.run(request).await
}
