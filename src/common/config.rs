// src/common/config.rs
//! Process-wide configuration, read once at startup

use std::env;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

/// Immutable configuration shared by every component.
///
/// Built once in `main` and handed to each constructor; nothing reads the
/// environment after startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub google_client_id: String,
    pub google_client_secret: String,
    pub google_redirect_uri: String,
    pub frontend_url: String,
    pub jwt_secret: String,
    pub database_url: String,
    pub allowed_hosts: Vec<String>,
    pub cors_origins: Vec<String>,
    pub port: u16,
    pub provider_timeout: Duration,
    pub sentry_dsn: Option<String>,
    /// Drop and recreate the schema at startup
    pub reset_db: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    ///
    /// `from_env` is the production entry point; tests feed a map instead of
    /// mutating the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| -> Result<String, ConfigError> {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or(ConfigError::Missing(key))
        };

        let google_client_id = required("GOOGLE_CLIENT_ID")?;
        let google_client_secret = required("GOOGLE_CLIENT_SECRET")?;
        let google_redirect_uri = required("GOOGLE_REDIRECT_URI")?;
        let frontend_url = required("FRONTEND_URL")?.trim_end_matches('/').to_string();
        let jwt_secret = required("JWT_SECRET")?;

        let database_url =
            lookup("DATABASE_URL").unwrap_or_else(|| "sqlite://auth.db".to_string());

        let allowed_hosts = split_list(
            &lookup("ALLOWED_HOSTS").unwrap_or_else(|| "localhost,127.0.0.1".to_string()),
        );

        let cors_origins = split_list(
            &lookup("CORS_ORIGINS").unwrap_or_else(|| "http://localhost:3000".to_string()),
        );

        let port = match lookup("PORT") {
            Some(p) => p.trim().parse::<u16>().map_err(|e| ConfigError::Invalid {
                key: "PORT",
                message: e.to_string(),
            })?,
            None => 8080,
        };

        let provider_timeout = match lookup("PROVIDER_TIMEOUT_SECS") {
            Some(s) => {
                let secs = s.trim().parse::<u64>().map_err(|e| ConfigError::Invalid {
                    key: "PROVIDER_TIMEOUT_SECS",
                    message: e.to_string(),
                })?;
                if secs == 0 {
                    return Err(ConfigError::Invalid {
                        key: "PROVIDER_TIMEOUT_SECS",
                        message: "must be greater than zero".to_string(),
                    });
                }
                Duration::from_secs(secs)
            }
            None => Duration::from_secs(10),
        };

        let sentry_dsn = lookup("SENTRY_DSN").filter(|s| !s.trim().is_empty());

        let reset_db = lookup("RESET_DB")
            .map(|v| v.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Ok(Self {
            google_client_id,
            google_client_secret,
            google_redirect_uri,
            frontend_url,
            jwt_secret,
            database_url,
            allowed_hosts,
            cors_origins,
            port,
            provider_timeout,
            sentry_dsn,
            reset_db,
        })
    }

    pub fn login_redirect(&self) -> String {
        format!("{}/login", self.frontend_url)
    }

    pub fn success_redirect(&self, token: &str) -> String {
        format!(
            "{}/auth/callback?token={}",
            self.frontend_url,
            urlencoding::encode(token)
        )
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
