//! Access tokens for Google APIs.
//!
//! Two grants are supported: an installed-app OAuth refresh token, and a
//! service account signing its own JWT assertion (optionally impersonating
//! a Workspace user). Tokens are cached until shortly before they expire.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use crate::config::{GmailCredentials, ServiceAccountKey};
use crate::error::AuthError;
use crate::google::error_message;

pub const OAUTH_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

pub const SHEETS_SCOPES: &[&str] = &["https://www.googleapis.com/auth/spreadsheets"];

pub const GMAIL_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/gmail.send",
    "https://www.googleapis.com/auth/gmail.compose",
];

/// Lifetime requested for service account assertions.
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Refresh this long before the reported expiry.
const EXPIRY_SKEW: Duration = Duration::from_secs(60);

/// Anything that can hand out a bearer token.
#[async_trait]
pub trait AccessTokenSource: Send + Sync {
    async fn access_token(&self) -> Result<String, AuthError>;
}

/// How to obtain a token.
#[derive(Debug, Clone)]
pub enum TokenGrant {
    RefreshToken {
        client_id: String,
        client_secret: SecretString,
        refresh_token: SecretString,
    },
    ServiceAccount {
        key: ServiceAccountKey,
        scopes: Vec<String>,
        subject: Option<String>,
    },
}

impl TokenGrant {
    /// Service account grant for the given scopes.
    pub fn service_account(key: ServiceAccountKey, scopes: &[&str]) -> Self {
        Self::ServiceAccount {
            key,
            scopes: scopes.iter().map(|s| s.to_string()).collect(),
            subject: None,
        }
    }

    /// Grant for Gmail from configured credentials.
    pub fn for_gmail(credentials: &GmailCredentials) -> Self {
        match credentials {
            GmailCredentials::OAuth {
                client_id,
                client_secret,
                refresh_token,
            } => Self::RefreshToken {
                client_id: client_id.clone(),
                client_secret: client_secret.clone(),
                refresh_token: refresh_token.clone(),
            },
            GmailCredentials::ServiceAccount { key, subject } => Self::ServiceAccount {
                key: key.clone(),
                scopes: GMAIL_SCOPES.iter().map(|s| s.to_string()).collect(),
                subject: Some(subject.clone()),
            },
        }
    }
}

/// JWT claims for the service account bearer grant.
#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: String,
    aud: &'a str,
    iat: i64,
    exp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    sub: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    refresh_at: DateTime<Utc>,
}

/// Token provider backed by Google's OAuth token endpoint.
pub struct GoogleTokenProvider {
    client: reqwest::Client,
    grant: TokenGrant,
    cache: Mutex<Option<CachedToken>>,
}

impl GoogleTokenProvider {
    pub fn new(client: reqwest::Client, grant: TokenGrant) -> Self {
        Self {
            client,
            grant,
            cache: Mutex::new(None),
        }
    }

    async fn fetch(&self) -> Result<TokenResponse, AuthError> {
        let request = match &self.grant {
            TokenGrant::RefreshToken {
                client_id,
                client_secret,
                refresh_token,
            } => self.client.post(OAUTH_TOKEN_URI).form(&[
                ("grant_type", "refresh_token"),
                ("client_id", client_id.as_str()),
                ("client_secret", client_secret.expose_secret()),
                ("refresh_token", refresh_token.expose_secret()),
            ]),
            TokenGrant::ServiceAccount {
                key,
                scopes,
                subject,
            } => {
                let assertion = sign_assertion(key, scopes, subject.as_deref(), Utc::now())?;
                self.client.post(&key.token_uri).form(&[
                    ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                    ("assertion", assertion.as_str()),
                ])
            }
        };

        let resp = request.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AuthError::Rejected {
                status: status.as_u16(),
                message: error_message(status.as_u16(), &body),
            });
        }
        Ok(resp.json::<TokenResponse>().await?)
    }
}

#[async_trait]
impl AccessTokenSource for GoogleTokenProvider {
    async fn access_token(&self) -> Result<String, AuthError> {
        let mut cache = self.cache.lock().await;
        if let Some(cached) = cache.as_ref()
            && Utc::now() < cached.refresh_at
        {
            return Ok(cached.token.clone());
        }

        let response = self.fetch().await?;
        let lifetime = response.expires_in.unwrap_or(0);
        let refresh_at = Utc::now()
            + chrono::Duration::seconds(lifetime.saturating_sub(EXPIRY_SKEW.as_secs()) as i64);
        debug!(expires_in = lifetime, "Fetched Google access token");

        *cache = Some(CachedToken {
            token: response.access_token.clone(),
            refresh_at,
        });
        Ok(response.access_token)
    }
}

fn assertion_claims<'a>(
    key: &'a ServiceAccountKey,
    scopes: &[String],
    subject: Option<&'a str>,
    now: DateTime<Utc>,
) -> AssertionClaims<'a> {
    let iat = now.timestamp();
    AssertionClaims {
        iss: &key.client_email,
        scope: scopes.join(" "),
        aud: &key.token_uri,
        iat,
        exp: iat + ASSERTION_LIFETIME_SECS,
        sub: subject,
    }
}

fn sign_assertion(
    key: &ServiceAccountKey,
    scopes: &[String],
    subject: Option<&str>,
    now: DateTime<Utc>,
) -> Result<String, AuthError> {
    let claims = assertion_claims(key, scopes, subject, now);
    let encoding_key = EncodingKey::from_rsa_pem(key.private_key.expose_secret().as_bytes())?;
    Ok(jsonwebtoken::encode(
        &Header::new(Algorithm::RS256),
        &claims,
        &encoding_key,
    )?)
}
