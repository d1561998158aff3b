use axum::extract::{Query, State};
use axum::http::{HeaderMap, header};
use axum::response::{AppendHeaders, IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use url::Url;

use crate::auth::Session;
use crate::state::AppState;

const ACCESS_TOKEN_COOKIE: &str = "merak-access-token";
const REFRESH_TOKEN_COOKIE: &str = "merak-refresh-token";
const REFRESH_TOKEN_MAX_AGE_SECS: i64 = 60 * 60 * 24 * 30;

pub fn router() -> Router<AppState> {
    Router::new().route("/auth/callback", get(auth_callback))
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct CallbackParams {
    /// One-time code issued by the auth provider
    #[serde(default)]
    pub code: Option<String>,
    /// Same-origin path to land on after sign-in (default `/`)
    #[serde(default)]
    pub next: Option<String>,
}

/// Why a callback sent the user back to the login page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CallbackFailure {
    MissingCode,
    AuthConfig,
    AuthCallback,
}

impl CallbackFailure {
    fn flag(self) -> &'static str {
        match self {
            Self::MissingCode => "missing_code",
            Self::AuthConfig => "auth_config",
            Self::AuthCallback => "auth_callback",
        }
    }
}

/// Complete an OAuth or magic-link sign-in
///
/// Exchanges the one-time code for a session, stores it in cookies and
/// redirects to `next`. Failures redirect to the login page with an `error`
/// flag; this endpoint never renders an error page.
#[utoipa::path(
    get,
    path = "/auth/callback",
    params(CallbackParams),
    responses(
        (status = 303, description = "Redirect to `next` or to the login page with an error flag")
    ),
    tag = "auth"
)]
pub async fn auth_callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
    headers: HeaderMap,
) -> Response {
    let site_url = state.site_url.as_ref();

    let Some(code) = params.code.as_deref().filter(|c| !c.is_empty()) else {
        return login_redirect(site_url, CallbackFailure::MissingCode);
    };

    let Some(auth) = state.auth.as_ref() else {
        tracing::error!("Auth provider URL or anon key missing in environment");
        return login_redirect(site_url, CallbackFailure::AuthConfig);
    };

    let verifier = read_cookie(&headers, &state.code_verifier_cookie);
    let session = match auth
        .exchange_code_for_session(code, verifier.as_deref())
        .await
    {
        Ok(session) => session,
        Err(err) => {
            tracing::error!(error = %err, "Auth session exchange failed");
            return login_redirect(site_url, CallbackFailure::AuthCallback);
        }
    };

    let target = redirect_target(site_url, &sanitize_next(params.next.as_deref()));
    let secure = site_url.is_some_and(|url| url.scheme() == "https");
    (
        AppendHeaders(session_cookies(&session, secure, &state.code_verifier_cookie)),
        Redirect::to(&target),
    )
        .into_response()
}

/// Accept `next` only when it is a path on this site.
///
/// `//host` and `/\host` are protocol-relative to browsers and are refused.
pub fn sanitize_next(next: Option<&str>) -> String {
    match next {
        Some(path)
            if path.starts_with('/')
                && !path.starts_with("//")
                && !path.starts_with("/\\")
                && !path.chars().any(char::is_control) =>
        {
            path.to_string()
        }
        _ => "/".to_string(),
    }
}

/// Resolve a sanitized path against the public site URL, if one is set.
fn redirect_target(site_url: Option<&Url>, path: &str) -> String {
    let Some(site) = site_url else {
        return path.to_string();
    };
    match site.join(path) {
        Ok(url) if url.origin() == site.origin() => url.to_string(),
        _ => site.join("/").map(|u| u.to_string()).unwrap_or_else(|_| "/".into()),
    }
}

fn login_redirect(site_url: Option<&Url>, failure: CallbackFailure) -> Response {
    let target = redirect_target(site_url, &format!("/login?error={}", failure.flag()));
    Redirect::to(&target).into_response()
}

fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}

fn session_cookies(
    session: &Session,
    secure: bool,
    verifier_cookie: &str,
) -> Vec<(header::HeaderName, String)> {
    let attributes = if secure {
        "Path=/; HttpOnly; SameSite=Lax; Secure"
    } else {
        "Path=/; HttpOnly; SameSite=Lax"
    };
    vec![
        (
            header::SET_COOKIE,
            format!(
                "{ACCESS_TOKEN_COOKIE}={}; Max-Age={}; {attributes}",
                session.access_token, session.expires_in
            ),
        ),
        (
            header::SET_COOKIE,
            format!(
                "{REFRESH_TOKEN_COOKIE}={}; Max-Age={REFRESH_TOKEN_MAX_AGE_SECS}; {attributes}",
                session.refresh_token
            ),
        ),
        (
            header::SET_COOKIE,
            format!("{verifier_cookie}=; Max-Age=0; {attributes}"),
        ),
    ]
}
