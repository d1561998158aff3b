use std::sync::Arc;

use url::Url;

use crate::auth::AuthProvider;
use crate::store::ProfileStore;

/// Upstream chat service the proxy forwards to.
#[derive(Clone)]
pub struct ChatUpstream {
    pub client: reqwest::Client,
    pub endpoint: Url,
}

impl ChatUpstream {
    pub fn new(client: reqwest::Client, backend_url: &Url) -> Result<Self, url::ParseError> {
        let base = backend_url.as_str().trim_end_matches('/');
        let endpoint = Url::parse(&format!("{base}/chatkit"))?;
        Ok(Self { client, endpoint })
    }
}

/// Shared handles, built once in `main` and cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    /// `None` when no store is configured; lookups then fail with a 500.
    pub profiles: Option<Arc<dyn ProfileStore>>,
    pub auth: Option<Arc<dyn AuthProvider>>,
    pub chat: ChatUpstream,
    pub site_url: Option<Url>,
    pub code_verifier_cookie: String,
}
