use merak_core::tools::ProfileLoadOutcome;
use serde_json::{Value, json};

use crate::util::{api_request, client};

const AGENTS_PATH: &str = "/api/agents";

/// `merak profiles <ids>`: print the lookup response as-is.
pub async fn run(api_url: &str, agent_ids: &[String]) -> i32 {
    api_request(
        api_url,
        reqwest::Method::POST,
        AGENTS_PATH,
        Some(json!({ "agentIds": agent_ids })),
    )
    .await
}

/// Load profiles for a `display_agent_profiles` tool call.
///
/// An empty id list answers `{success: true, count: 0}` without a request.
pub async fn load_profiles(
    api_url: &str,
    agent_ids: &[String],
) -> (Vec<Value>, ProfileLoadOutcome) {
    if agent_ids.is_empty() {
        return (Vec::new(), ProfileLoadOutcome::loaded(0));
    }

    let url = format!("{api_url}{AGENTS_PATH}");
    let response = match client()
        .post(&url)
        .json(&json!({ "agentIds": agent_ids }))
        .send()
        .await
    {
        Ok(response) => response,
        Err(err) => {
            tracing::warn!(error = %err, "Agent profile request failed");
            return (Vec::new(), ProfileLoadOutcome::failed(err.to_string()));
        }
    };

    let status = response.status();
    if !status.is_success() {
        return (
            Vec::new(),
            ProfileLoadOutcome::failed(format!("HTTP {}", status.as_u16())),
        );
    }

    match response.json::<Value>().await {
        Ok(body) => {
            let profiles = body
                .get("profiles")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            let count = profiles.len();
            (profiles, ProfileLoadOutcome::loaded(count))
        }
        Err(err) => (Vec::new(), ProfileLoadOutcome::failed(err.to_string())),
    }
}
