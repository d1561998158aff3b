use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Error body returned by every Merak endpoint.
///
/// Input errors name the violated constraint. Infrastructure errors carry a
/// generic message only; the detail stays in the server log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// Human-readable description of what went wrong
    pub error: String,
}

impl ApiError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}

/// Messages used on the wire. Clients match on some of these verbatim.
pub mod messages {
    pub const INVALID_JSON_BODY: &str = "Invalid JSON body";
    pub const AGENT_IDS_NOT_ARRAY: &str = "agentIds must be an array";
    pub const PROFILES_LOAD_FAILED: &str = "Failed to load agent profiles";
    pub const UNSUPPORTED_ACTION: &str = "Unsupported action";
    pub const CHAT_BACKEND_UNREACHABLE: &str = "Failed to reach chat backend";
    pub const INTERNAL_ERROR: &str = "An internal error occurred";
    pub const RATE_LIMITED: &str = "Too many requests";
}
