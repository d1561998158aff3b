use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use serde::Serialize;
use sqlx::postgres::PgPoolOptions;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod auth;
mod config;
mod error;
mod extract;
mod middleware;
mod routes;
mod state;
mod store;

use config::Config;
use state::{AppState, ChatUpstream};
use store::{PgProfileStore, PostgrestProfileStore, ProfileStore};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Merak API",
        version = "0.1.0",
        description = "Agent profile lookup, chat relay and sign-in callback for the Merak site."
    ),
    paths(
        routes::health::health_check,
        routes::agents::lookup_agent_profiles,
        routes::chatkit::proxy_chatkit,
        routes::auth_callback::auth_callback,
    ),
    components(schemas(
        HealthResponse,
        merak_core::error::ApiError,
        merak_core::profiles::AgentLookupRequest,
        merak_core::profiles::AgentLookupResponse,
        merak_core::profiles::AgentProfile,
        merak_core::profiles::Endorsement,
    ))
)]
struct ApiDoc;

#[derive(Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[tokio::main]
async fn main() {
    // Load .env if present (dev only)
    let _ = dotenvy::dotenv();

    // Structured JSON logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "merak_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let config = Config::from_env().expect("Invalid configuration");
    let http = reqwest::Client::new();

    let profiles = connect_profile_store(&config).await;
    let auth = config.auth.clone().map(|auth| {
        Arc::new(auth::HostedAuth::new(http.clone(), auth.url, auth.anon_key))
            as Arc<dyn auth::AuthProvider>
    });
    if auth.is_none() {
        tracing::warn!("SUPABASE_ANON_KEY not set; sign-in callbacks will fail");
    }

    let app_state = AppState {
        profiles,
        auth,
        chat: ChatUpstream::new(http, &config.backend_url).expect("Invalid BACKEND_URL"),
        site_url: config.site_url.clone(),
        code_verifier_cookie: config.code_verifier_cookie.clone(),
    };

    let app = build_router(app_state, &config);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Merak API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listener");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Server error");
}

/// Pick the profile store backend. Direct Postgres wins over the hosted
/// data API when both are configured.
async fn connect_profile_store(config: &Config) -> Option<Arc<dyn ProfileStore>> {
    if let Some(database_url) = &config.database_url {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .expect("Failed to connect to database");
        tracing::info!("Agent profiles served from Postgres");
        return Some(Arc::new(PgProfileStore::new(pool)));
    }

    if let Some(rest) = &config.rest_store {
        let store = PostgrestProfileStore::new(rest.url.clone(), &rest.service_role_key)
            .expect("Failed to build profile store client");
        tracing::info!(url = %rest.url, "Agent profiles served from hosted data API");
        return Some(Arc::new(store));
    }

    tracing::warn!(
        "Missing DATABASE_URL or SUPABASE_URL/SUPABASE_SERVICE_ROLE_KEY; profile lookups will fail"
    );
    None
}

fn build_router(app_state: AppState, config: &Config) -> Router {
    let cors_layer = middleware::cors::build_cors_layer(&config.cors_origins);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .merge(routes::health::router())
        .merge(routes::agents::router().layer(middleware::rate_limit::agents_layer()))
        .merge(routes::chatkit::router().layer(middleware::rate_limit::chat_layer()))
        .merge(
            routes::auth_callback::router()
                .layer(middleware::rate_limit::auth_callback_layer()),
        )
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .option_layer(config.require_https.then(|| {
                    axum::middleware::from_fn(middleware::https::require_https)
                }))
                .layer(axum::middleware::from_fn(middleware::security_headers::apply))
                .layer(cors_layer),
        )
        .with_state(app_state)
}
