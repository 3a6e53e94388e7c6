//! Google sign-in: OAuth2 authorization-code flow
//!
//! `initiate` produces the provider redirect and a fresh `state` nonce. The
//! handler binds that nonce to the browser with a short-lived cookie and hands
//! it back to `callback`, which refuses any callback whose `state` does not
//! match. Every refusal and every provider failure ends in
//! [`CallbackOutcome::Denied`]; only credential store and token encoding
//! failures escape as errors.

use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use super::models::{CallbackParams, SessionSubject};
use super::store::{NewUser, UserStore};
use super::token::{TokenCodec, TokenError};
use crate::common::{generate_url_safe_token, safe_email_log, ApiError, AppConfig};
use crate::services::{IdentityProvider, ProviderError};

/// Bytes of entropy in each `state` nonce
pub const STATE_BYTES: usize = 16;

#[derive(Debug, Error)]
pub enum FederatedError {
    #[error("provider reported an error: {0}")]
    ProviderDenied(String),

    #[error("callback carried no authorization code")]
    MissingCode,

    #[error("state parameter missing or does not match")]
    StateMismatch,

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("token response carried no id_token")]
    MissingIdToken,

    #[error("identity carried no email")]
    MissingEmail,

    #[error(transparent)]
    Store(#[from] sqlx::Error),

    #[error(transparent)]
    Token(#[from] TokenError),
}

#[derive(Debug, Clone)]
pub struct AuthorizationRedirect {
    pub url: String,
    pub state: String,
}

#[derive(Debug)]
pub enum CallbackOutcome {
    Resolved { token: String },
    Denied(FederatedError),
}

impl CallbackOutcome {
    pub fn redirect_url(&self, config: &AppConfig) -> String {
        match self {
            CallbackOutcome::Resolved { token } => config.success_redirect(token),
            CallbackOutcome::Denied(_) => config.login_redirect(),
        }
    }
}

#[derive(Clone)]
pub struct FederatedAuth {
    provider: Arc<dyn IdentityProvider>,
    store: UserStore,
    tokens: TokenCodec,
}

impl std::fmt::Debug for FederatedAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FederatedAuth").finish_non_exhaustive()
    }
}

impl FederatedAuth {
    pub fn new(provider: Arc<dyn IdentityProvider>, store: UserStore, tokens: TokenCodec) -> Self {
        Self {
            provider,
            store,
            tokens,
        }
    }

    pub fn initiate(&self) -> AuthorizationRedirect {
        let state = generate_url_safe_token(STATE_BYTES);
        let url = self.provider.authorization_url(&state);
        AuthorizationRedirect { url, state }
    }

    /// `expected_state` is the nonce bound to the browser at `initiate` time.
    pub async fn callback(
        &self,
        params: &CallbackParams,
        expected_state: Option<&str>,
    ) -> Result<CallbackOutcome, ApiError> {
        match self.resolve(params, expected_state).await {
            Ok(token) => Ok(CallbackOutcome::Resolved { token }),
            Err(FederatedError::Store(e)) => Err(ApiError::DatabaseError(e)),
            Err(FederatedError::Token(e)) => Err(ApiError::InternalServer(e.to_string())),
            Err(reason) => {
                warn!(reason = %reason, "Federated sign-in denied");
                Ok(CallbackOutcome::Denied(reason))
            }
        }
    }

    async fn resolve(
        &self,
        params: &CallbackParams,
        expected_state: Option<&str>,
    ) -> Result<String, FederatedError> {
        if let Some(error) = &params.error {
            return Err(FederatedError::ProviderDenied(error.clone()));
        }
        let code = params
            .code
            .as_deref()
            .filter(|c| !c.is_empty())
            .ok_or(FederatedError::MissingCode)?;

        match (params.state.as_deref(), expected_state) {
            (Some(got), Some(expected)) if !expected.is_empty() && got == expected => {}
            _ => return Err(FederatedError::StateMismatch),
        }

        let exchange = self.provider.exchange_code(code).await?;
        let id_token = exchange
            .id_token
            .filter(|t| !t.is_empty())
            .ok_or(FederatedError::MissingIdToken)?;

        let identity = self.provider.token_info(&id_token).await?;
        let email = identity
            .email
            .filter(|e| !e.is_empty())
            .ok_or(FederatedError::MissingEmail)?;

        let subject = SessionSubject {
            email,
            name: identity.name.unwrap_or_default(),
            picture: identity.picture.unwrap_or_default(),
        };

        let created = self
            .store
            .insert_if_absent(&NewUser {
                email: subject.email.clone(),
                name: subject.name.clone(),
                password_hash: None,
                picture: subject.picture.clone(),
                provider: "google",
            })
            .await?;

        info!(
            email = %safe_email_log(&subject.email),
            new_account = created,
            "Federated sign-in resolved"
        );

        Ok(self.tokens.issue(subject)?)
    }
}
