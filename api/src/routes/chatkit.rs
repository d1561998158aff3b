use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::Response;
use axum::Router;
use axum::routing::post;
use merak_core::error::{ApiError, messages};
use serde_json::Value;

use crate::error::AppError;
use crate::extract::JsonBody;
use crate::state::AppState;

const SUPPORTED_ACTIONS: &[&str] = &["threads.create", "threads.add_user_message"];

pub fn router() -> Router<AppState> {
    Router::new().route("/api/chatkit", post(proxy_chatkit))
}

/// Forward a chat envelope to the upstream chat service
///
/// Only thread creation and user messages are relayed. The upstream status,
/// headers and streamed body are passed through unchanged.
#[utoipa::path(
    post,
    path = "/api/chatkit",
    responses(
        (status = 200, description = "Upstream response, usually text/event-stream"),
        (status = 400, description = "Malformed body or unsupported action", body = ApiError),
        (status = 502, description = "Chat backend unreachable", body = ApiError)
    ),
    tag = "chat"
)]
pub async fn proxy_chatkit(
    State(state): State<AppState>,
    headers: HeaderMap,
    JsonBody(envelope): JsonBody,
) -> Result<Response, AppError> {
    if !is_supported_action(&envelope) {
        return Err(AppError::BadRequest(messages::UNSUPPORTED_ACTION.to_string()));
    }

    let mut request = state
        .chat
        .client
        .post(state.chat.endpoint.clone())
        .json(&envelope);
    if let Some(authorization) = headers.get(header::AUTHORIZATION) {
        request = request.header(header::AUTHORIZATION, authorization.clone());
    }

    let upstream = request
        .send()
        .await
        .map_err(|e| AppError::Upstream(e.to_string()))?;

    let status = StatusCode::from_u16(upstream.status().as_u16())
        .map_err(|e| AppError::Internal(e.to_string()))?;

    let mut builder = Response::builder().status(status);
    if let Some(response_headers) = builder.headers_mut() {
        for (name, value) in upstream.headers() {
            if is_skipped_header(name) {
                continue;
            }
            response_headers.append(name.clone(), value.clone());
        }
    }

    builder
        .body(Body::from_stream(upstream.bytes_stream()))
        .map_err(|e| AppError::Internal(e.to_string()))
}

// Connection-scoped, or recomputed by the server when relaying.
fn is_skipped_header(name: &header::HeaderName) -> bool {
    [
        header::CONNECTION,
        header::TRANSFER_ENCODING,
        header::CONTENT_LENGTH,
        header::CONTENT_ENCODING,
    ]
    .contains(name)
}

fn is_supported_action(envelope: &Value) -> bool {
    envelope
        .get("type")
        .and_then(Value::as_str)
        .is_some_and(|action| SUPPORTED_ACTIONS.contains(&action))
}
