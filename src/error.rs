//! Error types for the follow-up job.

/// Top-level error type for a run.
///
/// Anything reaching this type is fatal: the run either never starts or
/// cannot continue. Per-row problems are [`DispatchError`]s and are absorbed
/// into the run summary instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Row store error: {0}")]
    Store(#[from] StoreError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Access-token acquisition errors.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Failed to sign service account assertion: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),

    #[error("Token request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Token endpoint rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },
}

/// Row store (spreadsheet) errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Auth failed: {0}")]
    Auth(#[from] AuthError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Sheets API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid range URL: {0}")]
    Url(String),
}

/// Mail transport errors.
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Quota exceeded: {0}")]
    Quota(String),

    #[error("Malformed message: {0}")]
    InvalidMessage(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Gmail API error ({status}): {message}")]
    Provider { status: u16, message: String },
}

impl From<AuthError> for MailError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Rejected { message, .. } => Self::Auth(message),
            other => Self::Auth(other.to_string()),
        }
    }
}

/// Template lookup errors.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("No template found for key '{0}' and no follow_up fallback.")]
    NotFound(String),

    #[error("Failed to read template {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Failure of a single row between template resolution and dispatch.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Mail(#[from] MailError),
}

impl DispatchError {
    /// Human-readable message recorded in the summary and audit trail.
    ///
    /// Provider-reported messages are used verbatim; everything else falls
    /// back to the display text.
    pub fn failure_message(&self) -> String {
        match self {
            Self::Mail(
                MailError::Provider { message, .. }
                | MailError::Auth(message)
                | MailError::Quota(message)
                | MailError::InvalidMessage(message),
            ) if !message.is_empty() => message.clone(),
            other => other.to_string(),
        }
    }
}

/// Result type alias for the job.
pub type Result<T> = std::result::Result<T, Error>;
