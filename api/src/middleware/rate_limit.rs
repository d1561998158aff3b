use axum::Json;
use axum::http::{Response, StatusCode, header};
use axum::response::IntoResponse;
use merak_core::error::{ApiError, messages};
use tower_governor::{
    GovernorError, GovernorLayer, governor::GovernorConfigBuilder,
    key_extractor::SmartIpKeyExtractor,
};

type RateLimitLayer =
    GovernorLayer<SmartIpKeyExtractor, governor::middleware::NoOpMiddleware, axum::body::Body>;

/// Rate limit for POST /api/agents: 120 requests/minute per IP.
pub fn agents_layer() -> RateLimitLayer {
    GovernorLayer::new(
        GovernorConfigBuilder::default()
            .per_millisecond(500) // 120 per minute = 2 per second replenish
            .burst_size(30)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .expect("invalid governor config for agents"),
    )
    .error_handler(json_error_handler)
}

/// Rate limit for POST /api/chatkit: 60 requests/minute per IP.
pub fn chat_layer() -> RateLimitLayer {
    GovernorLayer::new(
        GovernorConfigBuilder::default()
            .per_second(1)
            .burst_size(20)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .expect("invalid governor config for chat"),
    )
    .error_handler(json_error_handler)
}

/// Rate limit for GET /auth/callback: 10 requests per minute per IP.
pub fn auth_callback_layer() -> RateLimitLayer {
    GovernorLayer::new(
        GovernorConfigBuilder::default()
            .per_second(6)
            .burst_size(10)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .expect("invalid governor config for auth callback"),
    )
    .error_handler(json_error_handler)
}

/// Render governor rejections in the `{ "error": ... }` shape, with Retry-After.
fn json_error_handler(err: GovernorError) -> Response<axum::body::Body> {
    match err {
        GovernorError::TooManyRequests { wait_time, .. } => (
            StatusCode::TOO_MANY_REQUESTS,
            [(header::RETRY_AFTER, wait_time.to_string())],
            Json(ApiError::new(format!(
                "{}. Retry after {wait_time} seconds.",
                messages::RATE_LIMITED
            ))),
        )
            .into_response(),
        GovernorError::UnableToExtractKey => {
            tracing::error!("Unable to determine client identity for rate limiting");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiError::new(messages::INTERNAL_ERROR)),
            )
                .into_response()
        }
        GovernorError::Other { code, msg, .. } => (
            code,
            Json(ApiError::new(msg.unwrap_or_default().to_string())),
        )
            .into_response(),
    }
}
