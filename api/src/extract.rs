//! Custom extractors that convert axum rejections to structured AppError responses.
//!
//! Use `JsonBody` where a handler needs the raw JSON document. Unlike
//! `axum::Json`, it ignores the request content type (browser clients are not
//! consistent about it) and turns every read or parse failure into the
//! "Invalid JSON body" 400.

use axum::body::Bytes;
use axum::extract::{FromRequest, Request};
use merak_core::error::messages;
use serde_json::Value;

use crate::error::AppError;

pub struct JsonBody(pub Value);

impl<S> FromRequest<S> for JsonBody
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|_| invalid_json())?;
        parse_json_body(&bytes).map(JsonBody)
    }
}

pub fn parse_json_body(bytes: &[u8]) -> Result<Value, AppError> {
    serde_json::from_slice(bytes).map_err(|_| invalid_json())
}

fn invalid_json() -> AppError {
    AppError::BadRequest(messages::INVALID_JSON_BODY.to_string())
}
