//! Read-only access to agent profiles in the hosted store.
//!
//! Both backends return rows as loosely-typed JSON; normalization happens in
//! `merak_core::profiles` so they cannot drift apart.

use async_trait::async_trait;
use reqwest::{Client, header};
use serde_json::Value;
use sqlx::PgPool;
use url::Url;

const PROFILES_TABLE: &str = "agent_profiles";

const PROFILE_COLUMNS: &str = "id,name,tagline,profile_img,card_description,profile_description,\
developer,highlights,demo_link,base_rate,success_rate,experience_years,availability,industry,\
agent_type,languages,created_at";

const ENDORSEMENT_EMBED: &str =
    "agent_endorsements(id,endorser_name,endorser_role,endorsement_text,created_at)";

const SELECT_PROFILES_SQL: &str = "\
SELECT to_jsonb(p) || jsonb_build_object('endorsements', COALESCE(( \
    SELECT jsonb_agg(jsonb_build_object( \
        'id', e.id, \
        'endorser_name', e.endorser_name, \
        'endorser_role', e.endorser_role, \
        'endorsement_text', e.endorsement_text, \
        'created_at', e.created_at) ORDER BY e.created_at) \
    FROM agent_endorsements e WHERE e.agent_id = p.id), '[]'::jsonb)) \
FROM agent_profiles p \
WHERE p.id::text = ANY($1)";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("profile store is not configured")]
    NotConfigured,
    #[error("store request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("store query failed ({status}): {body}")]
    Status { status: u16, body: String },
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("invalid store configuration: {0}")]
    Config(String),
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Fetch every profile whose id is in `ids`, in no particular order.
    async fn fetch_profiles(&self, ids: &[String]) -> Result<Vec<Value>, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

/// Hosted data API (PostgREST) client.
pub struct PostgrestProfileStore {
    client: Client,
    base_url: Url,
}

impl PostgrestProfileStore {
    pub fn new(base_url: Url, service_role_key: &str) -> Result<Self, StoreError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            "apikey",
            header::HeaderValue::from_str(service_role_key)
                .map_err(|e| StoreError::Config(format!("Invalid API key: {e}")))?,
        );
        headers.insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_str(&format!("Bearer {service_role_key}"))
                .map_err(|e| StoreError::Config(format!("Invalid API key: {e}")))?,
        );
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );

        let client = Client::builder().default_headers(headers).build()?;
        Ok(Self { client, base_url })
    }

    fn rest_url(&self, path: &str) -> Result<Url, StoreError> {
        self.base_url
            .join(&format!("rest/v1/{path}"))
            .map_err(|e| StoreError::Config(e.to_string()))
    }
}

#[async_trait]
impl ProfileStore for PostgrestProfileStore {
    async fn fetch_profiles(&self, ids: &[String]) -> Result<Vec<Value>, StoreError> {
        let select = format!("{PROFILE_COLUMNS},{ENDORSEMENT_EMBED}");
        let response = self
            .client
            .get(self.rest_url(PROFILES_TABLE)?)
            .query(&[("select", select), ("id", in_filter(ids))])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Status { status, body });
        }

        Ok(response.json().await?)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let response = self.client.get(self.rest_url("")?).send().await?;
        if response.status().is_server_error() {
            return Err(StoreError::Status {
                status: response.status().as_u16(),
                body: String::new(),
            });
        }
        Ok(())
    }
}

/// Direct Postgres access for deployments that can reach the database.
pub struct PgProfileStore {
    pool: PgPool,
}

impl PgProfileStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProfileStore for PgProfileStore {
    async fn fetch_profiles(&self, ids: &[String]) -> Result<Vec<Value>, StoreError> {
        let rows = sqlx::query_scalar::<_, Value>(SELECT_PROFILES_SQL)
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(())
    }
}

/// PostgREST `in.(...)` filter with every value double-quoted, so ids
/// containing commas or parentheses stay intact.
fn in_filter(ids: &[String]) -> String {
    let quoted: Vec<String> = ids
        .iter()
        .map(|id| format!("\"{}\"", id.replace('\\', "\\\\").replace('"', "\\\"")))
        .collect();
    format!("in.({})", quoted.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_filter_quotes_values() {
        let ids = vec!["a".to_string(), "b,c".to_string(), "say \"hi\"".to_string()];
        assert_eq!(in_filter(&ids), r#"in.("a","b,c","say \"hi\"")"#);
    }

    #[test]
    fn rest_url_keeps_project_path() {
        let store =
            PostgrestProfileStore::new(Url::parse("https://proj.supabase.co").unwrap(), "key")
                .unwrap();
        assert_eq!(
            store.rest_url(PROFILES_TABLE).unwrap().as_str(),
            "https://proj.supabase.co/rest/v1/agent_profiles"
        );
    }

    #[test]
    fn rejects_keys_that_are_not_header_safe() {
        let result =
            PostgrestProfileStore::new(Url::parse("https://proj.supabase.co").unwrap(), "bad\nkey");
        assert!(matches!(result, Err(StoreError::Config(_))));
    }
}
