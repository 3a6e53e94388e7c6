//! Authentication data models

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Placeholder stored as `picture` for locally registered accounts
pub const DEFAULT_PICTURE: &str = "null";

/// User database model
#[derive(FromRow, Serialize, Deserialize, Debug, Clone)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub picture: String,
    pub provider: String,
    pub created_at: Option<String>,
}

/// Public view of a user; never carries the password hash
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct UserOut {
    pub name: String,
    pub email: String,
    pub picture: String,
}

impl From<&User> for UserOut {
    fn from(user: &User) -> Self {
        Self {
            name: user.name.clone(),
            email: user.email.clone(),
            picture: user.picture.clone(),
        }
    }
}

/// POST /auth/register body
#[derive(Deserialize, Debug)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// POST /auth/login body
#[derive(Deserialize, Debug)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct TokenResponse {
    pub token: String,
}

/// Identity carried in the `sub` claim of a session token
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SessionSubject {
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub picture: String,
}

impl From<&User> for SessionSubject {
    fn from(user: &User) -> Self {
        Self {
            email: user.email.clone(),
            name: user.name.clone(),
            picture: user.picture.clone(),
        }
    }
}

/// JWT claims structure
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Claims {
    pub sub: SessionSubject,
    pub iat: i64,
    pub exp: i64,
}

/// Query string of the provider's redirect back to `/auth/callback`
#[derive(Deserialize, Debug, Default)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}
