//! Email + password registration and login

use tracing::{error, info, warn};

use super::models::{SessionSubject, UserOut, DEFAULT_PICTURE};
use super::password::{dummy_hash, hash_password, verify_password, PasswordError};
use super::store::{NewUser, StoreError, UserStore};
use super::token::TokenCodec;
use crate::common::{safe_email_log, ApiError};

const INVALID_CREDENTIALS: &str = "Invalid credentials.";
const USER_EXISTS: &str = "User already exists.";

#[derive(Clone, Debug)]
pub struct LocalAuth {
    store: UserStore,
    tokens: TokenCodec,
}

impl LocalAuth {
    pub fn new(store: UserStore, tokens: TokenCodec) -> Self {
        Self { store, tokens }
    }

    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<UserOut, ApiError> {
        if self.store.find_by_email(email).await?.is_some() {
            info!(email = %safe_email_log(email), "Registration rejected: email already registered");
            return Err(ApiError::Conflict(USER_EXISTS.to_string()));
        }

        let password = password.to_string();
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(|e| ApiError::InternalServer(format!("hashing task failed: {}", e)))?
            .map_err(|e| ApiError::InternalServer(e.to_string()))?;

        let new_user = NewUser {
            email: email.to_string(),
            name: name.to_string(),
            password_hash: Some(password_hash),
            picture: DEFAULT_PICTURE.to_string(),
            provider: "local",
        };

        let user = match self.store.insert(&new_user).await {
            Ok(user) => user,
            // Lost a race with a concurrent registration for the same email
            Err(StoreError::Duplicate) => return Err(ApiError::Conflict(USER_EXISTS.to_string())),
            Err(StoreError::Database(e)) => return Err(ApiError::DatabaseError(e)),
        };

        info!(user_id = %user.id, email = %safe_email_log(&user.email), "Local account registered");
        Ok(UserOut::from(&user))
    }

    /// Returns a session token. Unknown email, provider-only account and wrong
    /// password all produce the same `Unauthorized`.
    pub async fn login(&self, email: &str, password: &str) -> Result<String, ApiError> {
        let user = self.store.find_by_email(email).await?;
        let stored_hash = user.as_ref().and_then(|u| u.password_hash.clone());

        // Misses still pay for a full verification
        let password = password.to_string();
        let verified = tokio::task::spawn_blocking(move || match stored_hash {
            Some(hash) => Some(verify_password(&password, &hash)),
            None => {
                let _ = verify_password(&password, dummy_hash());
                None
            }
        })
        .await
        .map_err(|e| ApiError::InternalServer(format!("verification task failed: {}", e)))?;

        let (Some(user), Some(verified)) = (user, verified) else {
            warn!(email = %safe_email_log(email), "Login failed: no local credentials");
            return Err(ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()));
        };

        match verified {
            Ok(true) => {}
            Ok(false) => {
                warn!(email = %safe_email_log(email), "Login failed: password mismatch");
                return Err(ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()));
            }
            Err(PasswordError::MalformedHash(detail)) => {
                error!(user_id = %user.id, detail = %detail, "Stored password hash is malformed");
                return Err(ApiError::InternalServer("malformed stored password hash".to_string()));
            }
            Err(e) => return Err(ApiError::InternalServer(e.to_string())),
        }

        let token = self
            .tokens
            .issue(SessionSubject::from(&user))
            .map_err(|e| ApiError::InternalServer(e.to_string()))?;

        info!(user_id = %user.id, email = %safe_email_log(&user.email), "Local login successful");
        Ok(token)
    }
}
