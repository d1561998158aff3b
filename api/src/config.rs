use url::Url;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:8000";
const DEFAULT_CODE_VERIFIER_COOKIE: &str = "merak-auth-code-verifier";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} is not a valid port: {value}")]
    InvalidPort { name: &'static str, value: String },
    #[error("{name} is not a valid URL: {source}")]
    InvalidUrl {
        name: &'static str,
        #[source]
        source: url::ParseError,
    },
}

/// Credentials for the hosted data API.
#[derive(Debug, Clone)]
pub struct RestStoreConfig {
    pub url: Url,
    pub service_role_key: String,
}

/// Credentials for the hosted auth provider.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub url: Url,
    pub anon_key: String,
}

/// Process configuration, read once from the environment at start-up.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// Direct Postgres access. Preferred over `rest_store` when both are set.
    pub database_url: Option<String>,
    pub rest_store: Option<RestStoreConfig>,
    pub auth: Option<AuthConfig>,
    pub code_verifier_cookie: String,
    pub backend_url: Url,
    pub site_url: Option<Url>,
    pub cors_origins: Vec<String>,
    pub require_https: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any key lookup; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let port = match get("PORT") {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidPort {
                name: "PORT",
                value: raw,
            })?,
            None => DEFAULT_PORT,
        };

        let supabase_url = get("SUPABASE_URL")
            .map(|raw| parse_url("SUPABASE_URL", &raw))
            .transpose()?;

        let rest_store = match (&supabase_url, get("SUPABASE_SERVICE_ROLE_KEY")) {
            (Some(url), Some(service_role_key)) => Some(RestStoreConfig {
                url: url.clone(),
                service_role_key,
            }),
            _ => None,
        };

        let auth_url = match get("SUPABASE_AUTH_URL") {
            Some(raw) => Some(parse_url("SUPABASE_AUTH_URL", &raw)?),
            None => supabase_url,
        };
        let auth = match (auth_url, get("SUPABASE_ANON_KEY")) {
            (Some(url), Some(anon_key)) => Some(AuthConfig { url, anon_key }),
            _ => None,
        };

        let backend_url = parse_url(
            "BACKEND_URL",
            &get("BACKEND_URL").unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string()),
        )?;

        let site_url = get("SITE_URL")
            .map(|raw| parse_url("SITE_URL", &raw))
            .transpose()?;

        let cors_origins = get("MERAK_CORS_ORIGINS")
            .unwrap_or_else(|| "http://localhost:3000".to_string())
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        Ok(Self {
            port,
            database_url: get("DATABASE_URL"),
            rest_store,
            auth,
            code_verifier_cookie: get("AUTH_CODE_VERIFIER_COOKIE")
                .unwrap_or_else(|| DEFAULT_CODE_VERIFIER_COOKIE.to_string()),
            backend_url,
            site_url,
            cors_origins,
            require_https: get("MERAK_REQUIRE_HTTPS").is_some_and(|v| v == "true"),
        })
    }
}

fn parse_url(name: &'static str, raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw.trim()).map_err(|source| ConfigError::InvalidUrl { name, source })
}
