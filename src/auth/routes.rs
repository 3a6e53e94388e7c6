//! Authentication routes

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers;

/// Creates and returns the authentication router, nested under `/auth`
///
/// # Routes
/// - `POST /auth/register` - Local account registration
/// - `POST /auth/login` - Email + password login
/// - `GET /auth/login` - Start Google OAuth flow
/// - `GET /auth/callback` - Google OAuth callback
/// - `GET /auth/me` - Claims of the presented bearer token
pub fn auth_routes() -> Router {
    Router::new()
        .route("/register", post(handlers::register))
        .route("/login", post(handlers::login).get(handlers::google_login))
        .route("/callback", get(handlers::google_callback))
        .route("/me", get(handlers::me))
}
