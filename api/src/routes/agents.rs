use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use merak_core::error::ApiError;
use merak_core::profiles::{self, AgentLookupResponse};

use crate::error::AppError;
use crate::extract::JsonBody;
use crate::state::AppState;
use crate::store::StoreError;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/agents", post(lookup_agent_profiles))
}

/// Look up agent profiles by id
///
/// Ids are trimmed, blank and non-string entries are dropped, duplicates are
/// collapsed. Profiles come back in request order; ids with no match are
/// simply absent.
#[utoipa::path(
    post,
    path = "/api/agents",
    request_body = merak_core::profiles::AgentLookupRequest,
    responses(
        (status = 200, description = "Matching profiles in request order", body = AgentLookupResponse),
        (status = 400, description = "Malformed body or too many ids", body = ApiError),
        (status = 500, description = "Store unavailable", body = ApiError)
    ),
    tag = "agents"
)]
pub async fn lookup_agent_profiles(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody,
) -> Result<Json<AgentLookupResponse>, AppError> {
    let agent_ids = profiles::agent_ids_from_payload(&payload)?;

    if agent_ids.is_empty() {
        return Ok(Json(AgentLookupResponse {
            profiles: Vec::new(),
        }));
    }

    let store = state.profiles.as_ref().ok_or(StoreError::NotConfigured)?;
    let rows = store.fetch_profiles(&agent_ids).await?;

    tracing::debug!(
        requested = agent_ids.len(),
        returned = rows.len(),
        "Agent profiles loaded"
    );

    Ok(Json(AgentLookupResponse {
        profiles: profiles::shape_profiles(&rows, &agent_ids),
    }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;
    use crate::state::testing::{FakeStore, state_with};

    async fn post_agents(store: Option<Arc<FakeStore>>, body: &str) -> (StatusCode, Value) {
        let profiles = store.map(|s| s as Arc<dyn crate::store::ProfileStore>);
        let app = router().with_state(state_with(profiles, None));
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/agents")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .expect("request should build"),
            )
            .await
            .expect("request should succeed");

        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn sample_rows() -> Vec<Value> {
        vec![
            json!({"id": "x", "name": "Xena", "base_rate": "42", "languages": null}),
            json!({"id": "y", "name": "Yuri", "base_rate": null, "highlights": ["fast"]}),
            json!({"id": "z", "name": "Zed"}),
        ]
    }

    #[tokio::test]
    async fn invalid_json_is_rejected() {
        let (status, body) = post_agents(None, "{agentIds:").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"error": "Invalid JSON body"}));
    }

    #[tokio::test]
    async fn non_array_agent_ids_are_rejected() {
        for payload in [r#"{"agentIds":"x"}"#, r#"{"agentIds":1}"#, r#"{"agentIds":null}"#] {
            let (status, body) = post_agents(None, payload).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body, json!({"error": "agentIds must be an array"}));
        }
    }

    #[tokio::test]
    async fn empty_effective_set_skips_the_store() {
        let store = Arc::new(FakeStore::with_rows(sample_rows()));
        let (status, body) =
            post_agents(Some(store.clone()), r#"{"agentIds":["  ", "", 7]}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"profiles": []}));
        assert_eq!(store.call_count(), 0);
    }

    #[tokio::test]
    async fn ids_are_normalized_before_querying() {
        let store = Arc::new(FakeStore::with_rows(sample_rows()));
        let (status, _) =
            post_agents(Some(store.clone()), r#"{"agentIds":["  x  ","x",5,""]}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(*store.calls.lock().unwrap(), vec![vec!["x".to_string()]]);
    }

    #[tokio::test]
    async fn over_limit_is_rejected() {
        let ids: Vec<String> = (0..51).map(|i| format!("agent-{i}")).collect();
        let store = Arc::new(FakeStore::default());
        let (status, body) =
            post_agents(Some(store.clone()), &json!({ "agentIds": ids }).to_string()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"error": "Request exceeds max of 50 agent IDs"}));
        assert_eq!(store.call_count(), 0);
    }

    #[tokio::test]
    async fn exactly_fifty_ids_proceed() {
        let ids: Vec<String> = (0..50).map(|i| format!("agent-{i}")).collect();
        let store = Arc::new(FakeStore::default());
        let (status, _) =
            post_agents(Some(store.clone()), &json!({ "agentIds": ids }).to_string()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(store.call_count(), 1);
    }

    #[tokio::test]
    async fn profiles_follow_request_order_and_are_coerced() {
        let store = Arc::new(FakeStore::with_rows(sample_rows()));
        let (status, body) =
            post_agents(Some(store), r#"{"agentIds":["x","missing","y"]}"#).await;
        assert_eq!(status, StatusCode::OK);

        let profiles = body["profiles"].as_array().unwrap();
        let ids: Vec<&str> = profiles.iter().map(|p| p["id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["x", "y"]);
        assert_eq!(profiles[0]["base_rate"], json!(42));
        assert_eq!(profiles[0]["languages"], json!([]));
        assert_eq!(profiles[1]["base_rate"], Value::Null);
        assert_eq!(profiles[1]["highlights"], json!(["fast"]));
    }

    #[tokio::test]
    async fn store_failure_is_generic() {
        let store = Arc::new(FakeStore::failing());
        let (status, body) = post_agents(Some(store), r#"{"agentIds":["x"]}"#).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({"error": "Failed to load agent profiles"}));
    }

    #[tokio::test]
    async fn missing_store_is_a_server_error() {
        let (status, body) = post_agents(None, r#"{"agentIds":["x"]}"#).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({"error": "Failed to load agent profiles"}));
    }
}
