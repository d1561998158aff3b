use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use utoipa::ToSchema;

use crate::error::messages;

/// Upper bound on distinct agent ids accepted by one lookup request.
pub const MAX_AGENT_IDS: usize = 50;

/// Rejections produced while reading a lookup request body.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AgentIdsError {
    #[error("{}", messages::INVALID_JSON_BODY)]
    InvalidJson,
    #[error("{}", messages::AGENT_IDS_NOT_ARRAY)]
    NotAnArray,
    #[error("Request exceeds max of {max} agent IDs")]
    TooMany { max: usize },
}

/// Request body for POST /api/agents
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AgentLookupRequest {
    pub agent_ids: Vec<String>,
}

/// Response body for POST /api/agents
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AgentLookupResponse {
    pub profiles: Vec<AgentProfile>,
}

/// Parse a raw request body into the effective, deduplicated id list.
///
/// The body must be JSON with an `agentIds` array. Everything else about the
/// entries is forgiven: non-strings and blank strings are dropped.
pub fn parse_agent_ids_body(body: &[u8]) -> Result<Vec<String>, AgentIdsError> {
    let payload: Value = serde_json::from_slice(body).map_err(|_| AgentIdsError::InvalidJson)?;
    agent_ids_from_payload(&payload)
}

/// Read `agentIds` from an already-decoded request body.
pub fn agent_ids_from_payload(payload: &Value) -> Result<Vec<String>, AgentIdsError> {
    let entries = payload
        .get("agentIds")
        .and_then(Value::as_array)
        .ok_or(AgentIdsError::NotAnArray)?;
    normalize_agent_ids(entries)
}

/// Trim, filter and deduplicate identifiers, keeping first-occurrence order.
pub fn normalize_agent_ids(entries: &[Value]) -> Result<Vec<String>, AgentIdsError> {
    let mut seen = HashSet::new();
    let mut ids = Vec::new();
    for entry in entries {
        let Some(raw) = entry.as_str() else { continue };
        let trimmed = raw.trim();
        if trimmed.is_empty() || !seen.insert(trimmed) {
            continue;
        }
        ids.push(trimmed.to_string());
    }

    if ids.len() > MAX_AGENT_IDS {
        return Err(AgentIdsError::TooMany { max: MAX_AGENT_IDS });
    }
    Ok(ids)
}

/// A marketplace listing as returned to the chat page.
///
/// Owned by the hosted store; Merak only reads and reshapes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AgentProfile {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub tagline: Option<String>,
    #[serde(default)]
    pub profile_img: Option<String>,
    #[serde(default)]
    pub card_description: Option<String>,
    #[serde(default)]
    pub profile_description: Option<String>,
    #[serde(default)]
    pub developer: Option<String>,
    #[serde(default)]
    pub highlights: Vec<String>,
    #[serde(default)]
    pub demo_link: Option<String>,
    #[serde(default, serialize_with = "serialize_js_number")]
    pub base_rate: Option<f64>,
    #[serde(default, serialize_with = "serialize_js_number")]
    pub success_rate: Option<f64>,
    #[serde(default, serialize_with = "serialize_js_number")]
    pub experience_years: Option<f64>,
    #[serde(default)]
    pub availability: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub agent_type: Option<String>,
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub endorsements: Vec<Endorsement>,
}

/// Third-party testimonial attached to a profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Endorsement {
    pub id: String,
    #[serde(default)]
    pub endorser_name: String,
    pub endorser_role: Option<String>,
    #[serde(default)]
    pub endorsement_text: String,
    pub created_at: Option<String>,
}

impl AgentProfile {
    /// Build a profile from a loosely-typed store row.
    ///
    /// Returns `None` only when the row has no usable `id`.
    pub fn from_store_row(row: &Value) -> Option<Self> {
        let id = id_field(row.get("id")?)?;
        Some(Self {
            id,
            name: string_field(row, "name").unwrap_or_default(),
            tagline: string_field(row, "tagline"),
            profile_img: string_field(row, "profile_img"),
            card_description: string_field(row, "card_description"),
            profile_description: string_field(row, "profile_description"),
            developer: string_field(row, "developer"),
            highlights: string_array(row.get("highlights")),
            demo_link: string_field(row, "demo_link"),
            base_rate: row.get("base_rate").and_then(coerce_number),
            success_rate: row.get("success_rate").and_then(coerce_number),
            experience_years: row.get("experience_years").and_then(coerce_number),
            availability: string_field(row, "availability"),
            industry: string_field(row, "industry"),
            agent_type: string_field(row, "agent_type"),
            languages: string_array(row.get("languages")),
            created_at: string_field(row, "created_at"),
            endorsements: endorsements(row),
        })
    }
}

impl Endorsement {
    pub fn from_store_row(row: &Value) -> Option<Self> {
        Some(Self {
            id: id_field(row.get("id")?)?,
            endorser_name: string_field(row, "endorser_name").unwrap_or_default(),
            endorser_role: string_field(row, "endorser_role"),
            endorsement_text: string_field(row, "endorsement_text").unwrap_or_default(),
            created_at: string_field(row, "created_at"),
        })
    }
}

/// Coerce a loosely-typed store value to a number the way `Number()` would.
///
/// `null` stays `None`. Values that would become `NaN` or an infinity are
/// reported as `None` too, since JSON has no encoding for them.
pub fn coerce_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Null => return None,
        Value::Number(n) => n.as_f64()?,
        Value::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                0.0
            } else {
                trimmed.parse::<f64>().ok()?
            }
        }
        Value::Array(_) | Value::Object(_) => return None,
    };
    number.is_finite().then_some(number)
}

/// Normalize store rows and order them by the caller's id order.
pub fn shape_profiles(rows: &[Value], requested: &[String]) -> Vec<AgentProfile> {
    let mut profiles: Vec<AgentProfile> =
        rows.iter().filter_map(AgentProfile::from_store_row).collect();
    order_by_request(&mut profiles, requested);
    profiles
}

/// Stable-sort profiles by the position of their id in `requested`.
/// Ids not present in `requested` sort last.
pub fn order_by_request(profiles: &mut [AgentProfile], requested: &[String]) {
    let rank: HashMap<&str, usize> = requested
        .iter()
        .enumerate()
        .map(|(index, id)| (id.as_str(), index))
        .collect();
    profiles.sort_by_key(|profile| rank.get(profile.id.as_str()).copied().unwrap_or(usize::MAX));
}

fn id_field(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn string_field(row: &Value, key: &str) -> Option<String> {
    row.get(key).and_then(Value::as_str).map(str::to_string)
}

fn string_array(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

// PostgREST names the embedded relation after the table; the SQL backend
// aliases it to `endorsements`.
fn endorsements(row: &Value) -> Vec<Endorsement> {
    row.get("endorsements")
        .or_else(|| row.get("agent_endorsements"))
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Endorsement::from_store_row).collect())
        .unwrap_or_default()
}

/// Emit whole numbers as JSON integers, matching what a JavaScript client
/// would have produced for the same value.
fn serialize_js_number<S>(value: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value {
        Some(n) if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 => {
            serializer.serialize_i64(*n as i64)
        }
        Some(n) => serializer.serialize_f64(*n),
        None => serializer.serialize_none(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn invalid_json_body_is_rejected() {
        assert_eq!(
            parse_agent_ids_body(b"{not json"),
            Err(AgentIdsError::InvalidJson)
        );
        assert_eq!(
            AgentIdsError::InvalidJson.to_string(),
            "Invalid JSON body"
        );
    }

    #[test]
    fn non_array_agent_ids_are_rejected() {
        for body in [
            r#"{"agentIds":"a"}"#,
            r#"{"agentIds":5}"#,
            r#"{"agentIds":null}"#,
            r#"{}"#,
            r#"["a"]"#,
        ] {
            assert_eq!(
                parse_agent_ids_body(body.as_bytes()),
                Err(AgentIdsError::NotAnArray),
                "body: {body}"
            );
        }
    }

    #[test]
    fn entries_are_trimmed_filtered_and_deduplicated() {
        let parsed = parse_agent_ids_body(br#"{"agentIds":["  a  ","a",5,""," ",null]}"#).unwrap();
        assert_eq!(parsed, ids(&["a"]));
    }

    #[test]
    fn dedup_keeps_first_occurrence_order() {
        let entries = vec![json!("b"), json!("a"), json!("b"), json!("c")];
        assert_eq!(normalize_agent_ids(&entries).unwrap(), ids(&["b", "a", "c"]));
    }

    #[test]
    fn fifty_distinct_ids_are_accepted() {
        let entries: Vec<Value> = (0..50).map(|i| json!(format!("agent-{i}"))).collect();
        assert_eq!(normalize_agent_ids(&entries).unwrap().len(), 50);
    }

    #[test]
    fn fifty_one_distinct_ids_are_rejected() {
        let entries: Vec<Value> = (0..51).map(|i| json!(format!("agent-{i}"))).collect();
        let err = normalize_agent_ids(&entries).unwrap_err();
        assert_eq!(err, AgentIdsError::TooMany { max: 50 });
        assert_eq!(err.to_string(), "Request exceeds max of 50 agent IDs");
    }

    #[test]
    fn duplicates_do_not_count_towards_the_limit() {
        let mut entries: Vec<Value> = (0..50).map(|i| json!(format!("agent-{i}"))).collect();
        entries.extend((0..10).map(|i| json!(format!("agent-{i}"))));
        assert_eq!(normalize_agent_ids(&entries).unwrap().len(), 50);
    }

    #[test]
    fn coerce_number_follows_number_semantics() {
        assert_eq!(coerce_number(&json!("42")), Some(42.0));
        assert_eq!(coerce_number(&json!(" 12.5 ")), Some(12.5));
        assert_eq!(coerce_number(&json!(7)), Some(7.0));
        assert_eq!(coerce_number(&json!("")), Some(0.0));
        assert_eq!(coerce_number(&json!(true)), Some(1.0));
        assert_eq!(coerce_number(&Value::Null), None);
    }

    #[test]
    fn coerce_number_maps_nan_to_none() {
        assert_eq!(coerce_number(&json!("forty")), None);
        assert_eq!(coerce_number(&json!("NaN")), None);
        assert_eq!(coerce_number(&json!("inf")), None);
        assert_eq!(coerce_number(&json!([1])), None);
        assert_eq!(coerce_number(&json!({"a": 1})), None);
    }

    #[test]
    fn store_row_is_normalized() {
        let row = json!({
            "id": "x",
            "name": "Xavier",
            "base_rate": "42",
            "success_rate": null,
            "experience_years": 3,
            "languages": "english",
            "highlights": ["fast", 3, "cheap"],
        });
        let profile = AgentProfile::from_store_row(&row).unwrap();
        assert_eq!(profile.base_rate, Some(42.0));
        assert_eq!(profile.success_rate, None);
        assert_eq!(profile.experience_years, Some(3.0));
        assert!(profile.languages.is_empty());
        assert_eq!(profile.highlights, ids(&["fast", "cheap"]));
        assert!(profile.endorsements.is_empty());
    }

    #[test]
    fn whole_numbers_serialize_as_integers() {
        let profile = AgentProfile::from_store_row(&json!({
            "id": "x",
            "base_rate": "42",
            "success_rate": "0.75",
        }))
        .unwrap();
        let encoded = serde_json::to_value(&profile).unwrap();
        assert_eq!(encoded["base_rate"], json!(42));
        assert_eq!(encoded["success_rate"], json!(0.75));
        assert_eq!(encoded["experience_years"], Value::Null);
    }

    #[test]
    fn endorsement_nullable_fields_are_explicit_nulls() {
        let profile = AgentProfile::from_store_row(&json!({
            "id": "x",
            "agent_endorsements": [
                {"id": "e1", "endorser_name": "Ada", "endorsement_text": "Great"},
                {"endorser_name": "no id"}
            ]
        }))
        .unwrap();
        assert_eq!(profile.endorsements.len(), 1);

        let encoded = serde_json::to_value(&profile.endorsements[0]).unwrap();
        assert_eq!(encoded["endorser_role"], Value::Null);
        assert_eq!(encoded["created_at"], Value::Null);
        assert!(encoded.as_object().unwrap().contains_key("endorser_role"));
    }

    #[test]
    fn rows_without_id_are_skipped() {
        let rows = vec![json!({"name": "ghost"}), json!({"id": "a"})];
        let profiles = shape_profiles(&rows, &ids(&["a"]));
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].id, "a");
    }

    #[test]
    fn results_follow_request_order() {
        let rows = vec![json!({"id": "y"}), json!({"id": "x"})];
        let profiles = shape_profiles(&rows, &ids(&["x", "y"]));
        let order: Vec<&str> = profiles.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(order, vec!["x", "y"]);
    }

    #[test]
    fn unmatched_ids_sort_last_and_stably() {
        let rows = vec![
            json!({"id": "stray-1"}),
            json!({"id": "b"}),
            json!({"id": "stray-2"}),
            json!({"id": "a"}),
        ];
        let profiles = shape_profiles(&rows, &ids(&["a", "b", "missing"]));
        let order: Vec<&str> = profiles.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(order, vec!["a", "b", "stray-1", "stray-2"]);
    }
}
