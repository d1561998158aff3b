use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use merak_core::error::{ApiError, messages};
use merak_core::profiles::AgentIdsError;

use crate::store::StoreError;

/// Internal error type that converts to `{ "error": ... }` responses.
///
/// Client mistakes are echoed back precisely. Infrastructure failures are
/// logged in full and answered with a generic message.
#[derive(Debug)]
pub enum AppError {
    /// Malformed or out-of-bounds input (400)
    BadRequest(String),
    /// Profile store failure (500)
    ProfileLookup(StoreError),
    /// Upstream chat service unreachable (502)
    Upstream(String),
    /// Internal error (500)
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            AppError::ProfileLookup(err) => {
                tracing::error!(error = %err, "Agent profile lookup failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    messages::PROFILES_LOAD_FAILED.to_string(),
                )
            }
            AppError::Upstream(msg) => {
                tracing::error!(error = %msg, "Chat backend request failed");
                (
                    StatusCode::BAD_GATEWAY,
                    messages::CHAT_BACKEND_UNREACHABLE.to_string(),
                )
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    messages::INTERNAL_ERROR.to_string(),
                )
            }
        };

        (status, Json(ApiError::new(message))).into_response()
    }
}

impl From<AgentIdsError> for AppError {
    fn from(err: AgentIdsError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::ProfileLookup(err)
    }
}

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;

    use super::*;

    async fn body_of(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn store_errors_are_not_echoed() {
        let (status, body) = body_of(AppError::ProfileLookup(StoreError::Status {
            status: 500,
            body: "permission denied for table agent_profiles".into(),
        }))
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, serde_json::json!({"error": "Failed to load agent profiles"}));
    }

    #[tokio::test]
    async fn validation_errors_name_the_constraint() {
        let (status, body) = body_of(AgentIdsError::TooMany { max: 50 }.into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Request exceeds max of 50 agent IDs");
    }

    #[tokio::test]
    async fn upstream_errors_map_to_bad_gateway() {
        let (status, body) = body_of(AppError::Upstream("connection refused".into())).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"], "Failed to reach chat backend");
    }
}
