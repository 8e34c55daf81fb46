//! OAuth2 access tokens for the Firestore REST API.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use crate::StoreError;

const DATASTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";
const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Refresh this long before the reported expiry.
const EXPIRY_MARGIN_SECS: i64 = 60;

fn default_token_uri() -> String {
    GOOGLE_TOKEN_URI.to_string()
}

/// Service account key file (`"type": "service_account"`).
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub private_key_id: Option<String>,
    pub private_key: String,
    pub client_email: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

/// User credentials written by `gcloud auth application-default login`.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthorizedUser {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    #[serde(default)]
    pub quota_project_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, StoreError> {
    if !path.exists() {
        return Err(StoreError::Credentials(format!(
            "credentials file not found: {}",
            path.display()
        )));
    }
    let text = std::fs::read_to_string(path)?;
    serde_json::from_str(&text).map_err(|e| {
        StoreError::Credentials(format!("invalid credentials file {}: {}", path.display(), e))
    })
}

impl ServiceAccountKey {
    pub fn from_file(path: &Path) -> Result<Self, StoreError> {
        read_json(path)
    }
}

impl AuthorizedUser {
    pub fn from_file(path: &Path) -> Result<Self, StoreError> {
        read_json(path)
    }
}

/// How requests are authorized.
#[derive(Debug, Clone)]
pub enum Credentials {
    /// Local emulator; accepts the fixed `owner` token.
    Emulator,
    /// Pre-minted bearer token.
    AccessToken(String),
    ServiceAccount(ServiceAccountKey),
    AuthorizedUser(AuthorizedUser),
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

/// Produces bearer tokens, exchanging and caching them as needed.
pub struct TokenSource {
    http: Client,
    credentials: Credentials,
    cached: RwLock<Option<CachedToken>>,
}

impl TokenSource {
    pub fn new(credentials: Credentials) -> Self {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build HTTP client");

        Self {
            http,
            credentials,
            cached: RwLock::new(None),
        }
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Current bearer token.
    pub async fn token(&self) -> Result<String, StoreError> {
        let response = match &self.credentials {
            Credentials::Emulator => return Ok("owner".to_string()),
            Credentials::AccessToken(token) => return Ok(token.clone()),
            Credentials::ServiceAccount(key) => {
                if let Some(token) = self.cached_token().await {
                    return Ok(token);
                }
                self.exchange_assertion(key).await?
            }
            Credentials::AuthorizedUser(user) => {
                if let Some(token) = self.cached_token().await {
                    return Ok(token);
                }
                self.exchange_refresh_token(user).await?
            }
        };

        let lifetime = response.expires_in.unwrap_or(3600) - EXPIRY_MARGIN_SECS;
        let cached = CachedToken {
            token: response.access_token,
            expires_at: Utc::now() + chrono::Duration::seconds(lifetime.max(0)),
        };
        debug!(expires_at = %cached.expires_at, "obtained access token");

        let token = cached.token.clone();
        *self.cached.write().await = Some(cached);
        Ok(token)
    }

    async fn cached_token(&self) -> Option<String> {
        self.cached
            .read()
            .await
            .as_ref()
            .filter(|cached| cached.expires_at > Utc::now())
            .map(|cached| cached.token.clone())
    }

    async fn exchange_assertion(
        &self,
        key: &ServiceAccountKey,
    ) -> Result<TokenResponse, StoreError> {
        let now = Utc::now().timestamp();
        let claims = AssertionClaims {
            iss: &key.client_email,
            scope: DATASTORE_SCOPE,
            aud: &key.token_uri,
            iat: now,
            exp: now + 3600,
        };

        let mut header = Header::new(Algorithm::RS256);
        header.kid = key.private_key_id.clone();
        let signing_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| StoreError::Credentials(format!("invalid private key: {}", e)))?;
        let assertion = jsonwebtoken::encode(&header, &claims, &signing_key)
            .map_err(|e| StoreError::Credentials(format!("failed to sign assertion: {}", e)))?;

        self.request_token(
            &key.token_uri,
            &[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ],
        )
        .await
    }

    async fn exchange_refresh_token(
        &self,
        user: &AuthorizedUser,
    ) -> Result<TokenResponse, StoreError> {
        self.request_token(
            &user.token_uri,
            &[
                ("grant_type", "refresh_token"),
                ("client_id", user.client_id.as_str()),
                ("client_secret", user.client_secret.as_str()),
                ("refresh_token", user.refresh_token.as_str()),
            ],
        )
        .await
    }

    async fn request_token(
        &self,
        token_uri: &str,
        form: &[(&str, &str)],
    ) -> Result<TokenResponse, StoreError> {
        let response = self.http.post(token_uri).form(form).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.map_err(|e| {
                StoreError::Auth(format!(
                    "token exchange failed ({}): failed to read response: {}",
                    status, e
                ))
            })?;
            return Err(StoreError::Auth(format!(
                "token exchange failed ({}): {}",
                status, text
            )));
        }

        Ok(response.json().await?)
    }
}
