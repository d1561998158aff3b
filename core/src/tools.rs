use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DISPLAY_AGENT_PROFILES: &str = "display_agent_profiles";
pub const WAIT_FOR_SEARCH_CONFIRMATION: &str = "wait_for_search_confirmation";

/// A client tool the chat widget asked the page to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientTool {
    DisplayAgentProfiles { agent_ids: Vec<String> },
    WaitForSearchConfirmation,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ToolError {
    #[error("unknown client tool '{0}'")]
    Unknown(String),
    #[error("invalid params for '{tool}': {reason}")]
    InvalidParams { tool: &'static str, reason: String },
}

impl ClientTool {
    /// Decode an invocation by name.
    ///
    /// `agent_ids` must be an array; its non-string entries are dropped.
    pub fn from_invocation(name: &str, params: &Value) -> Result<Self, ToolError> {
        match name {
            DISPLAY_AGENT_PROFILES => {
                let entries = params
                    .get("agent_ids")
                    .and_then(Value::as_array)
                    .ok_or_else(|| ToolError::InvalidParams {
                        tool: DISPLAY_AGENT_PROFILES,
                        reason: "agent_ids must be an array".to_string(),
                    })?;
                let agent_ids = entries
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect();
                Ok(Self::DisplayAgentProfiles { agent_ids })
            }
            WAIT_FOR_SEARCH_CONFIRMATION => Ok(Self::WaitForSearchConfirmation),
            other => Err(ToolError::Unknown(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::DisplayAgentProfiles { .. } => DISPLAY_AGENT_PROFILES,
            Self::WaitForSearchConfirmation => WAIT_FOR_SEARCH_CONFIRMATION,
        }
    }
}

/// What the page reports back to the widget after a tool ran.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileLoadOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProfileLoadOutcome {
    pub fn loaded(count: usize) -> Self {
        Self {
            success: true,
            count: Some(count),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            count: None,
            error: Some(error.into()),
        }
    }

    pub fn rejected() -> Self {
        Self {
            success: false,
            count: None,
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn decodes_display_agent_profiles() {
        let tool = ClientTool::from_invocation(
            "display_agent_profiles",
            &json!({"agent_ids": ["a", 3, "b", null]}),
        )
        .unwrap();
        assert_eq!(
            tool,
            ClientTool::DisplayAgentProfiles {
                agent_ids: vec!["a".into(), "b".into()]
            }
        );
        assert_eq!(tool.name(), "display_agent_profiles");
    }

    #[test]
    fn rejects_missing_agent_ids() {
        let err = ClientTool::from_invocation("display_agent_profiles", &json!({})).unwrap_err();
        assert!(matches!(err, ToolError::InvalidParams { .. }));
    }

    #[test]
    fn rejects_unknown_tools() {
        let err = ClientTool::from_invocation("launch_rockets", &json!({})).unwrap_err();
        assert_eq!(err, ToolError::Unknown("launch_rockets".into()));
    }

    #[test]
    fn wait_for_confirmation_takes_no_params() {
        assert_eq!(
            ClientTool::from_invocation("wait_for_search_confirmation", &Value::Null).unwrap(),
            ClientTool::WaitForSearchConfirmation
        );
    }

    #[test]
    fn outcome_omits_absent_fields() {
        assert_eq!(
            serde_json::to_value(ProfileLoadOutcome::loaded(2)).unwrap(),
            json!({"success": true, "count": 2})
        );
        assert_eq!(
            serde_json::to_value(ProfileLoadOutcome::rejected()).unwrap(),
            json!({"success": false})
        );
    }
}
