use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use url::Url;

/// Tokens returned by a successful code exchange.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("auth request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("auth provider rejected the code ({status}): {body}")]
    Rejected { status: u16, body: String },
    #[error("invalid auth configuration: {0}")]
    Config(String),
}

/// The hosted authentication provider, as far as the callback needs it.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn exchange_code_for_session(
        &self,
        code: &str,
        code_verifier: Option<&str>,
    ) -> Result<Session, AuthError>;
}

/// Hosted auth (GoTrue) client using the PKCE grant.
pub struct HostedAuth {
    client: Client,
    base_url: Url,
    anon_key: String,
}

impl HostedAuth {
    pub fn new(client: Client, base_url: Url, anon_key: String) -> Self {
        Self {
            client,
            base_url,
            anon_key,
        }
    }

    fn token_url(&self) -> Result<Url, AuthError> {
        let mut url = self
            .base_url
            .join("auth/v1/token")
            .map_err(|e| AuthError::Config(e.to_string()))?;
        url.query_pairs_mut().append_pair("grant_type", "pkce");
        Ok(url)
    }
}

#[async_trait]
impl AuthProvider for HostedAuth {
    async fn exchange_code_for_session(
        &self,
        code: &str,
        code_verifier: Option<&str>,
    ) -> Result<Session, AuthError> {
        let response = self
            .client
            .post(self.token_url()?)
            .header("apikey", &self.anon_key)
            .bearer_auth(&self.anon_key)
            .json(&json!({
                "auth_code": code,
                "code_verifier": code_verifier.unwrap_or_default(),
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Rejected { status, body });
        }

        Ok(response.json().await?)
    }
}
