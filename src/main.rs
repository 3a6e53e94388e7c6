// src/main.rs
use axum::{extract::Extension, http::HeaderValue, middleware, routing::get, Json, Router};
use dotenv::dotenv;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::path::PathBuf;
use std::{net::SocketAddr, str::FromStr, sync::Arc};
use tokio::net::TcpListener;
use tower_http::{
    compression::{predicate::SizeAbove, CompressionLayer},
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::{prelude::*, EnvFilter};

// ============================================================================
// MODULE IMPORTS
// ============================================================================

mod auth;
mod common;
mod host_middleware;
mod services;

use auth::UserStore;
use common::{AppConfig, AppState};
use host_middleware::trusted_host_middleware;
use services::{google::build_http_client, GoogleService};

/// Responses smaller than this are sent uncompressed
const COMPRESSION_MIN_BYTES: u16 = 1000;

// ============================================================================
// MAIN APPLICATION ENTRY POINT
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(sentry_tracing::layer())
        .init();

    // ========================================================================
    // ENVIRONMENT CONFIGURATION
    // ========================================================================

    let config = Arc::new(AppConfig::from_env()?);
    info!(
        allowed_hosts = ?config.allowed_hosts,
        frontend_url = %config.frontend_url,
        "Configuration loaded"
    );

    let _sentry_guard = config.sentry_dsn.as_deref().map(|dsn| {
        info!("Sentry error reporting enabled");
        sentry::init((
            dsn,
            sentry::ClientOptions {
                release: sentry::release_name!(),
                ..Default::default()
            },
        ))
    });

    // ========================================================================
    // DATABASE SETUP
    // ========================================================================

    if let Some(path_part) = config.database_url.strip_prefix("sqlite://") {
        let path_without_params = path_part.split('?').next().unwrap_or("");
        if !path_without_params.is_empty() && !path_without_params.starts_with(':') {
            let db_path = PathBuf::from(path_without_params);
            if let Some(parent) = db_path.parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent).await?;
                }
            }
        }
    }

    let connect_options =
        SqliteConnectOptions::from_str(&config.database_url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new().connect_with(connect_options).await?;

    common::migrations::run_migrations(&pool, config.reset_db).await?;

    // ========================================================================
    // SERVICE INITIALIZATION
    // ========================================================================

    let http_client = build_http_client(&config)?;
    let google_service = Arc::new(GoogleService::new(&config, http_client));
    info!(timeout = ?config.provider_timeout, "GoogleService initialized");

    let state = Arc::new(AppState::new(
        config.clone(),
        UserStore::new(pool),
        google_service,
    ));

    // ========================================================================
    // SERVER STARTUP
    // ========================================================================

    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

// ============================================================================
// ROUTER COMPOSITION
// ============================================================================

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.cors_origins);

    Router::new()
        .route("/", get(root))
        .nest("/auth", auth::auth_routes())
        .layer(middleware::from_fn(trusted_host_middleware))
        .layer(Extension(state))
        .layer(cors)
        .layer(CompressionLayer::new().compress_when(SizeAbove::new(COMPRESSION_MIN_BYTES)))
        .layer(TraceLayer::new_for_http())
}

/// `*` in CORS_ORIGINS mirrors the request origin, since credentials are allowed
fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::mirror_request()
    } else {
        AllowOrigin::list(
            origins
                .iter()
                .filter_map(|origin| origin.parse::<HeaderValue>().ok()),
        )
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
        ])
        .allow_credentials(true)
}

async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": "auth backend is running" }))
}
