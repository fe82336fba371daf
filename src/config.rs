//! Configuration types.
//!
//! Everything is read from the environment exactly once, in
//! [`AppConfig::from_env`], and passed by reference from there on.

use std::path::PathBuf;

use secrecy::SecretString;
use serde::Deserialize;

use crate::error::{self, ConfigError};

/// Default tab holding the lead rows.
pub const DEFAULT_FOLLOW_UP_TAB: &str = "Agent Follow Up";

/// Default tab receiving audit rows.
pub const DEFAULT_EMAIL_LOG_TAB: &str = "Email Log";

/// Default local template override directory.
pub const DEFAULT_TEMPLATE_DIR: &str = "templates/email";

/// Default candidate roots for shared templates, searched in order.
pub const DEFAULT_SHARED_TEMPLATE_ROOTS: &[&str] = &[
    "prophet-core",
    "../prophet-core",
    "node_modules/prophet-core",
];

/// Settings consumed by the pipeline itself.
#[derive(Debug, Clone)]
pub struct JobConfig {
    /// Spreadsheet holding both the follow-up tab and the log tab.
    pub sheet_id: String,
    pub follow_up_tab: String,
    pub email_log_tab: String,
    /// Create drafts instead of sending.
    pub dry_run: bool,
    pub templates: TemplateConfig,
}

impl JobConfig {
    /// Config with defaults for everything except the sheet id.
    pub fn new(sheet_id: impl Into<String>) -> Self {
        Self {
            sheet_id: sheet_id.into(),
            follow_up_tab: DEFAULT_FOLLOW_UP_TAB.to_string(),
            email_log_tab: DEFAULT_EMAIL_LOG_TAB.to_string(),
            dry_run: true,
            templates: TemplateConfig::default(),
        }
    }
}

/// Where template overrides are looked up.
#[derive(Debug, Clone)]
pub struct TemplateConfig {
    /// Local override directory (`<key>.md` files).
    pub local_dir: PathBuf,
    /// Candidate shared roots; the first that exists is used, with
    /// templates under `<root>/templates/email`.
    pub shared_roots: Vec<PathBuf>,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            local_dir: PathBuf::from(DEFAULT_TEMPLATE_DIR),
            shared_roots: DEFAULT_SHARED_TEMPLATE_ROOTS
                .iter()
                .map(PathBuf::from)
                .collect(),
        }
    }
}

/// Google service account key (the JSON downloaded from the console).
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    #[serde(deserialize_with = "deserialize_secret")]
    pub private_key: SecretString,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
where
    D: serde::Deserializer<'de>,
{
    String::deserialize(deserializer).map(SecretString::from)
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

/// Credentials used for Gmail.
#[derive(Debug, Clone)]
pub enum GmailCredentials {
    /// Installed-app OAuth client with a long-lived refresh token.
    OAuth {
        client_id: String,
        client_secret: SecretString,
        refresh_token: SecretString,
    },
    /// Service account with domain-wide delegation, acting as `subject`.
    ServiceAccount {
        key: ServiceAccountKey,
        subject: String,
    },
}

/// Gmail transport configuration.
#[derive(Debug, Clone)]
pub struct GmailConfig {
    /// `From` header of every outgoing message.
    pub from: String,
    pub credentials: GmailCredentials,
}

/// Full application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub job: JobConfig,
    /// Sheets always authenticates with the service account.
    pub sheets_key: ServiceAccountKey,
    pub gmail: GmailConfig,
}

impl AppConfig {
    /// Build config from environment variables.
    ///
    /// Loads `.env` first if present. Missing required values are fatal.
    pub fn from_env() -> error::Result<Self> {
        dotenvy::dotenv().ok();
        Ok(Self::from_lookup(|key| std::env::var(key).ok())?)
    }

    /// Build config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let sheet_id = get("SHEET_ID").ok_or_else(|| ConfigError::MissingEnvVar("SHEET_ID".into()))?;

        let templates = TemplateConfig {
            local_dir: get("TEMPLATE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_TEMPLATE_DIR)),
            shared_roots: get("SHARED_TEMPLATE_ROOTS")
                .map(|raw| {
                    raw.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(PathBuf::from)
                        .collect()
                })
                .unwrap_or_else(|| TemplateConfig::default().shared_roots),
        };

        let job = JobConfig {
            sheet_id,
            follow_up_tab: get("FOLLOW_UP_TAB").unwrap_or_else(|| DEFAULT_FOLLOW_UP_TAB.into()),
            email_log_tab: get("EMAIL_LOG_TAB").unwrap_or_else(|| DEFAULT_EMAIL_LOG_TAB.into()),
            dry_run: parse_dry_run(get("DRY_RUN").as_deref()),
            templates,
        };

        let sheets_key = match get("GOOGLE_SERVICE_ACCOUNT_JSON") {
            Some(raw) => parse_service_account(&raw)?,
            None => return Err(ConfigError::MissingEnvVar("GOOGLE_SERVICE_ACCOUNT_JSON".into())),
        };

        let from = get("GMAIL_FROM").ok_or_else(|| ConfigError::MissingEnvVar("GMAIL_FROM".into()))?;

        let credentials = match (
            get("GOOGLE_OAUTH_CLIENT_ID"),
            get("GOOGLE_OAUTH_CLIENT_SECRET"),
            get("GOOGLE_OAUTH_REFRESH_TOKEN"),
        ) {
            (Some(client_id), Some(secret), Some(refresh)) => GmailCredentials::OAuth {
                client_id,
                client_secret: SecretString::from(secret),
                refresh_token: SecretString::from(refresh),
            },
            _ => match get("GMAIL_IMPERSONATE_USER") {
                Some(subject) => GmailCredentials::ServiceAccount {
                    key: sheets_key.clone(),
                    subject,
                },
                None => {
                    return Err(ConfigError::MissingRequired {
                        key: "Gmail credentials".into(),
                        hint: "Set GOOGLE_OAUTH_CLIENT_ID, GOOGLE_OAUTH_CLIENT_SECRET and \
                               GOOGLE_OAUTH_REFRESH_TOKEN, or GMAIL_IMPERSONATE_USER for the \
                               service account."
                            .into(),
                    });
                }
            },
        };

        Ok(Self {
            job,
            sheets_key,
            gmail: GmailConfig { from, credentials },
        })
    }
}

/// Dry run unless explicitly switched off.
fn parse_dry_run(raw: Option<&str>) -> bool {
    match raw.map(str::to_lowercase).as_deref() {
        Some("false" | "0" | "no" | "off") => false,
        _ => true,
    }
}

fn parse_service_account(raw: &str) -> Result<ServiceAccountKey, ConfigError> {
    serde_json::from_str(raw).map_err(|e| ConfigError::InvalidValue {
        key: "GOOGLE_SERVICE_ACCOUNT_JSON".into(),
        message: format!("must be valid service account JSON: {e}"),
    })
}
