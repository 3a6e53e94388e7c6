// src/services/google.rs
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Deserializer};
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::common::{safe_token_log, AppConfig};

pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const GOOGLE_TOKENINFO_URL: &str = "https://www.googleapis.com/oauth2/v3/tokeninfo";

/// Scopes requested on every authorization redirect
pub const SCOPES: &str = "openid email profile";

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("provider returned HTTP {0}")]
    Status(u16),

    #[error("malformed provider response: {0}")]
    InvalidResponse(String),

    #[error("token audience mismatch")]
    AudienceMismatch,

    #[error("provider has not verified the email address")]
    EmailNotVerified,
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        ProviderError::RequestFailed(e.to_string())
    }
}

/// Token endpoint response; only `id_token` matters here
#[derive(Debug, Deserialize)]
pub struct TokenExchange {
    pub id_token: Option<String>,
    pub access_token: Option<String>,
    pub token_type: Option<String>,
}

/// Verified identity claims returned by the tokeninfo endpoint
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ProviderIdentity {
    pub email: Option<String>,
    pub name: Option<String>,
    pub picture: Option<String>,
    pub aud: Option<String>,
    /// tokeninfo sends `"true"`/`"false"` strings; a JSON bool is accepted too
    #[serde(default, deserialize_with = "flag_from_bool_or_string")]
    pub email_verified: bool,
}

fn flag_from_bool_or_string<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Text(String),
    }

    Ok(match Option::<Flag>::deserialize(deserializer)? {
        Some(Flag::Bool(b)) => b,
        Some(Flag::Text(s)) => s.eq_ignore_ascii_case("true"),
        None => false,
    })
}

/// The external identity provider, seen from the federated flow
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Authorization URL the browser is redirected to
    fn authorization_url(&self, state: &str) -> String;

    /// Exchange an authorization code at the token endpoint
    async fn exchange_code(&self, code: &str) -> Result<TokenExchange, ProviderError>;

    /// Resolve an `id_token` into verified identity claims
    async fn token_info(&self, id_token: &str) -> Result<ProviderIdentity, ProviderError>;
}

#[derive(Debug, Clone)]
pub struct GoogleService {
    client: Client,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    auth_url: String,
    token_url: String,
    tokeninfo_url: String,
}

impl GoogleService {
    /// `client` must carry the provider timeout; see `build_http_client`.
    pub fn new(config: &AppConfig, client: Client) -> Self {
        Self {
            client,
            client_id: config.google_client_id.clone(),
            client_secret: config.google_client_secret.clone(),
            redirect_uri: config.google_redirect_uri.clone(),
            auth_url: GOOGLE_AUTH_URL.to_string(),
            token_url: GOOGLE_TOKEN_URL.to_string(),
            tokeninfo_url: GOOGLE_TOKENINFO_URL.to_string(),
        }
    }

    #[cfg(test)]
    pub fn with_endpoints(mut self, auth_url: &str, token_url: &str, tokeninfo_url: &str) -> Self {
        self.auth_url = auth_url.to_string();
        self.token_url = token_url.to_string();
        self.tokeninfo_url = tokeninfo_url.to_string();
        self
    }
}

/// Outbound client for provider calls, bounded by the configured timeout
pub fn build_http_client(config: &AppConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(config.provider_timeout)
        .connect_timeout(config.provider_timeout)
        .build()
}

#[async_trait]
impl IdentityProvider for GoogleService {
    fn authorization_url(&self, state: &str) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&state={}",
            self.auth_url,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(SCOPES),
            urlencoding::encode(state)
        )
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenExchange, ProviderError> {
        let params = [
            ("code", code),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ];

        let response = self
            .client
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, endpoint = %self.token_url, "HTTP error contacting token endpoint");
                ProviderError::from(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(http_status = %status, "Token endpoint rejected authorization code");
            return Err(ProviderError::Status(status.as_u16()));
        }

        let tokens = response
            .json::<TokenExchange>()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        debug!(
            has_id_token = tokens.id_token.is_some(),
            has_access_token = tokens.access_token.is_some(),
            token_type = ?tokens.token_type,
            "Authorization code exchanged"
        );
        Ok(tokens)
    }

    async fn token_info(&self, id_token: &str) -> Result<ProviderIdentity, ProviderError> {
        debug!(id_token = %safe_token_log(id_token), "Validating id_token with tokeninfo endpoint");

        let response = self
            .client
            .get(&self.tokeninfo_url)
            .query(&[("id_token", id_token)])
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, endpoint = %self.tokeninfo_url, "HTTP error contacting tokeninfo endpoint");
                ProviderError::from(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(http_status = %status, "Tokeninfo endpoint rejected id_token");
            return Err(ProviderError::Status(status.as_u16()));
        }

        let identity = response
            .json::<ProviderIdentity>()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        match identity.aud.as_deref() {
            Some(aud) if aud == self.client_id => {}
            aud => {
                warn!(
                    token_audience = ?aud,
                    expected_client_id = %self.client_id,
                    "id_token audience validation failed"
                );
                return Err(ProviderError::AudienceMismatch);
            }
        }

        if !identity.email_verified {
            warn!("id_token email is not verified by the provider");
            return Err(ProviderError::EmailNotVerified);
        }

        Ok(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn test_config() -> AppConfig {
        AppConfig::from_lookup(|key| {
            match key {
                "GOOGLE_CLIENT_ID" => Some("test_client_id"),
                "GOOGLE_CLIENT_SECRET" => Some("test_secret"),
                "GOOGLE_REDIRECT_URI" => Some("http://localhost:8080/auth/callback"),
                "FRONTEND_URL" => Some("http://localhost:3000"),
                "JWT_SECRET" => Some("secret"),
                "PROVIDER_TIMEOUT_SECS" => Some("1"),
                _ => None,
            }
            .map(str::to_string)
        })
        .unwrap()
    }

    fn service() -> GoogleService {
        let config = test_config();
        GoogleService::new(&config, build_http_client(&config).unwrap())
    }

    #[test]
    fn test_get_authorization_url() {
        let url = service().authorization_url("abc_DEF-123");

        assert!(url.starts_with("https://accounts.google.com/o/oauth2/v2/auth?"));
        assert!(url.contains("client_id=test_client_id"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A8080%2Fauth%2Fcallback"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("scope=openid%20email%20profile"));
        assert!(url.contains("state=abc_DEF-123"));
    }

    #[test]
    fn test_with_endpoints_overrides_urls() {
        let url = service()
            .with_endpoints("http://127.0.0.1:9/authorize", "http://127.0.0.1:9/token", "http://127.0.0.1:9/info")
            .authorization_url("s");
        assert!(url.starts_with("http://127.0.0.1:9/authorize?"));
    }

    #[test]
    fn test_provider_identity_tolerates_missing_fields() {
        let identity: ProviderIdentity =
            serde_json::from_str(r#"{"email": "a@example.com", "email_verified": "true", "aud": "x"}"#)
                .unwrap();
        assert_eq!(identity.email.as_deref(), Some("a@example.com"));
        assert!(identity.email_verified);
        assert!(identity.name.is_none());
        assert!(identity.picture.is_none());
    }

    #[tokio::test]
    async fn test_exchange_code_network_failure() {
        // Nothing listens on the discard port; the request fails fast.
        let svc = service().with_endpoints(
            GOOGLE_AUTH_URL,
            "http://127.0.0.1:9/token",
            "http://127.0.0.1:9/info",
        );
        let result = tokio::time::timeout(Duration::from_secs(5), svc.exchange_code("abc")).await;
        assert!(matches!(result, Ok(Err(ProviderError::RequestFailed(_)))));
    }

    mod http {
        use super::*;
        use serde_json::json;
        use wiremock::matchers::{body_string_contains, header, method, path, query_param};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        fn service_at(server: &MockServer) -> GoogleService {
            service().with_endpoints(
                GOOGLE_AUTH_URL,
                &format!("{}/token", server.uri()),
                &format!("{}/tokeninfo", server.uri()),
            )
        }

        async fn tokeninfo_returns(server: &MockServer, body: serde_json::Value) {
            Mock::given(method("GET"))
                .and(path("/tokeninfo"))
                .and(query_param("id_token", "id-token"))
                .respond_with(ResponseTemplate::new(200).set_body_json(body))
                .mount(server)
                .await;
        }

        #[tokio::test]
        async fn test_exchange_code_posts_full_form() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/token"))
                .and(header("content-type", "application/x-www-form-urlencoded"))
                .and(body_string_contains("code=abc"))
                .and(body_string_contains("client_id=test_client_id"))
                .and(body_string_contains("client_secret=test_secret"))
                .and(body_string_contains(
                    "redirect_uri=http%3A%2F%2Flocalhost%3A8080%2Fauth%2Fcallback",
                ))
                .and(body_string_contains("grant_type=authorization_code"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "id_token": "id-token",
                    "access_token": "access",
                    "token_type": "Bearer"
                })))
                .expect(1)
                .mount(&server)
                .await;

            let tokens = service_at(&server).exchange_code("abc").await.unwrap();
            assert_eq!(tokens.id_token.as_deref(), Some("id-token"));
            assert_eq!(tokens.token_type.as_deref(), Some("Bearer"));
        }

        #[tokio::test]
        async fn test_exchange_code_rejected_status() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/token"))
                .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                    "error": "invalid_grant"
                })))
                .mount(&server)
                .await;

            let err = service_at(&server).exchange_code("abc").await.unwrap_err();
            assert!(matches!(err, ProviderError::Status(400)));
        }

        #[tokio::test]
        async fn test_exchange_code_malformed_body() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/token"))
                .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
                .mount(&server)
                .await;

            let err = service_at(&server).exchange_code("abc").await.unwrap_err();
            assert!(matches!(err, ProviderError::InvalidResponse(_)));
        }

        #[tokio::test]
        async fn test_exchange_code_times_out() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/token"))
                .respond_with(
                    ResponseTemplate::new(200)
                        .set_body_json(json!({ "id_token": "id-token" }))
                        .set_delay(Duration::from_secs(3)),
                )
                .mount(&server)
                .await;

            // test_config sets a one second provider timeout
            let err = service_at(&server).exchange_code("abc").await.unwrap_err();
            assert!(matches!(err, ProviderError::RequestFailed(_)));
        }

        #[tokio::test]
        async fn test_token_info_accepts_matching_audience() {
            let server = MockServer::start().await;
            tokeninfo_returns(
                &server,
                json!({
                    "email": "grace@example.com",
                    "email_verified": "true",
                    "name": "Grace",
                    "picture": "https://example.com/g.png",
                    "aud": "test_client_id"
                }),
            )
            .await;

            let identity = service_at(&server).token_info("id-token").await.unwrap();
            assert_eq!(identity.email.as_deref(), Some("grace@example.com"));
            assert_eq!(identity.name.as_deref(), Some("Grace"));
        }

        #[tokio::test]
        async fn test_token_info_rejects_wrong_audience() {
            let server = MockServer::start().await;
            tokeninfo_returns(
                &server,
                json!({ "email": "a@example.com", "email_verified": "true", "aud": "someone-else" }),
            )
            .await;

            let err = service_at(&server).token_info("id-token").await.unwrap_err();
            assert!(matches!(err, ProviderError::AudienceMismatch));
        }

        #[tokio::test]
        async fn test_token_info_rejects_missing_audience() {
            let server = MockServer::start().await;
            tokeninfo_returns(&server, json!({ "email": "a@example.com", "email_verified": "true" })).await;

            let err = service_at(&server).token_info("id-token").await.unwrap_err();
            assert!(matches!(err, ProviderError::AudienceMismatch));
        }

        #[tokio::test]
        async fn test_token_info_rejects_unverified_email() {
            let server = MockServer::start().await;
            tokeninfo_returns(
                &server,
                json!({ "email": "a@example.com", "email_verified": "false", "aud": "test_client_id" }),
            )
            .await;

            let err = service_at(&server).token_info("id-token").await.unwrap_err();
            assert!(matches!(err, ProviderError::EmailNotVerified));
        }

        #[tokio::test]
        async fn test_token_info_rejected_status() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/tokeninfo"))
                .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                    "error_description": "Invalid Value"
                })))
                .mount(&server)
                .await;

            let err = service_at(&server).token_info("id-token").await.unwrap_err();
            assert!(matches!(err, ProviderError::Status(400)));
        }

        #[tokio::test]
        async fn test_token_info_malformed_body() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/tokeninfo"))
                .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
                .mount(&server)
                .await;

            let err = service_at(&server).token_info("id-token").await.unwrap_err();
            assert!(matches!(err, ProviderError::InvalidResponse(_)));
        }
    }
}
