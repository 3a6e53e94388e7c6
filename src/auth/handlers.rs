//! Authentication handlers

use axum::{
    extract::{rejection::QueryRejection, Extension, Json, Query},
    http::{header::LOCATION, StatusCode},
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::extractors::SessionUser;
use super::federated::CallbackOutcome;
use super::models::{CallbackParams, Claims, LoginRequest, RegisterRequest, TokenResponse, UserOut};
use super::validators::{LoginValidator, RegisterValidator};
use crate::common::{ApiError, AppState, Validator};

/// Cookie carrying the `state` nonce between `GET /auth/login` and the callback
pub const STATE_COOKIE: &str = "oauth_state";
const STATE_COOKIE_PATH: &str = "/auth";
const STATE_COOKIE_MINUTES: i64 = 10;

/// 302 Found to `url`
fn found(url: &str) -> Response {
    (StatusCode::FOUND, [(LOCATION, url.to_string())]).into_response()
}

/// POST /auth/register
/// Creates a local account
///
/// # Request Body
/// ```json
/// { "name": "Ada", "email": "ada@example.com", "password": "at-least-8" }
/// ```
///
/// # Response
/// 201 with `{ "name", "email", "picture" }`, 409 when the email is taken
pub async fn register(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserOut>), ApiError> {
    RegisterValidator.validate(&payload).into_result()?;

    let user = state
        .local_auth
        .register(&payload.name, &payload.email, &payload.password)
        .await?;

    Ok((StatusCode::CREATED, Json(user)))
}

/// POST /auth/login
/// Exchanges email + password for a session token
///
/// # Response
/// ```json
/// { "token": "<jwt>" }
/// ```
pub async fn login(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    LoginValidator.validate(&payload).into_result()?;

    let token = state
        .local_auth
        .login(&payload.email, &payload.password)
        .await?;

    Ok(Json(TokenResponse { token }))
}

/// GET /auth/login - Start Google OAuth flow
/// Redirects to Google's authorization page and binds `state` to the browser
pub async fn google_login(Extension(state): Extension<Arc<AppState>>, jar: CookieJar) -> impl IntoResponse {
    let redirect = state.federated_auth.initiate();

    let cookie = Cookie::build((STATE_COOKIE, redirect.state))
        .path(STATE_COOKIE_PATH)
        .http_only(true)
        .secure(state.config.google_redirect_uri.starts_with("https://"))
        .same_site(SameSite::Lax)
        .max_age(time::Duration::minutes(STATE_COOKIE_MINUTES));

    info!("Redirecting to Google for authorization");
    (jar.add(cookie), found(&redirect.url))
}

/// GET /auth/callback - Handle OAuth callback from Google
/// Always answers with a redirect to the frontend: `/auth/callback?token=` on
/// success, `/login` on any failure, including a query string that does not parse
pub async fn google_callback(
    Extension(state): Extension<Arc<AppState>>,
    query: Result<Query<CallbackParams>, QueryRejection>,
    jar: CookieJar,
) -> Result<impl IntoResponse, ApiError> {
    let expected_state = jar.get(STATE_COOKIE).map(|c| c.value().to_string());
    // The nonce is single-use whatever the outcome
    let jar = jar.remove(Cookie::build(STATE_COOKIE).path(STATE_COOKIE_PATH));

    let Query(params) = match query {
        Ok(query) => query,
        Err(rejection) => {
            warn!(error = %rejection, "Malformed OAuth callback query");
            return Ok((jar, found(&state.config.login_redirect())));
        }
    };

    debug!(
        has_code = params.code.is_some(),
        has_state = params.state.is_some(),
        has_state_cookie = expected_state.is_some(),
        "Received OAuth callback"
    );

    let outcome = state
        .federated_auth
        .callback(&params, expected_state.as_deref())
        .await?;

    if let CallbackOutcome::Resolved { .. } = outcome {
        info!("Google sign-in complete, redirecting to frontend");
    }

    Ok((jar, found(&outcome.redirect_url(&state.config))))
}

/// GET /auth/me
/// Returns the claims of a valid bearer token
pub async fn me(SessionUser(claims): SessionUser) -> Json<Claims> {
    Json(claims)
}
