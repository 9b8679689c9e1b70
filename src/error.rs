//! Error types for ring-recordings-dl
//!
//! Errors fall into two tiers:
//! - [`Error`] covers run-level failures (configuration, authentication, enumeration,
//!   state storage). Any of these aborts the run with a nonzero exit code.
//! - [`FetchError`] covers a single recording download. It is classified as transient
//!   or permanent, recovered by the retry loop, and never escalated to the run.

use thiserror::Error;

/// Result type alias for ring-recordings-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Process exit code for a successful run (including "nothing to do")
pub const EXIT_SUCCESS: u8 = 0;

/// Process exit code for configuration, enumeration and authentication failures
pub const EXIT_FAILURE: u8 = 1;

/// Main error type for ring-recordings-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key or CLI flag that caused the error (e.g., "threads")
        key: Option<String>,
    },

    /// Ring API authentication or protocol error
    #[error("Ring API error: {0}")]
    Ring(#[from] RingError),

    /// The requested device does not exist under this account
    #[error("no Ring device with id {0} found under this account")]
    DeviceNotFound(i64),

    /// State database operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// SQLx database error
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for a configuration error tied to a specific key
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }

    /// Exit code reported by the CLI when a run ends with this error
    ///
    /// Every run-level error is a pre-flight, configuration or enumeration failure,
    /// so they all map to [`EXIT_FAILURE`].
    pub fn exit_code(&self) -> u8 {
        EXIT_FAILURE
    }

    /// Machine-readable error code, used as a structured logging field
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Ring(RingError::TwoFactorRequired) => "two_factor_required",
            Error::Ring(RingError::Throttled) => "throttled",
            Error::Ring(RingError::AuthenticationFailed(_)) => "authentication_failed",
            Error::Ring(RingError::UnexpectedResponse { .. }) => "unexpected_response",
            Error::DeviceNotFound(_) => "device_not_found",
            Error::Database(_) | Error::Sqlx(_) => "database_error",
            Error::Io(_) => "io_error",
            Error::Network(_) => "network_error",
            Error::Serialization(_) => "serialization_error",
            Error::Other(_) => "internal_error",
        }
    }
}

/// Ring API errors raised while establishing a session or enumerating history
#[derive(Debug, Error)]
pub enum RingError {
    /// The account has two-factor authentication enabled and a code is needed
    #[error("two-factor authentication code required")]
    TwoFactorRequired,

    /// Too many verification codes have been requested recently
    #[error("too many two-factor codes requested recently, wait a few minutes and try again")]
    Throttled,

    /// Credentials or refresh token were rejected
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The API answered with a status the client does not handle
    #[error("unexpected HTTP {status} from {endpoint}")]
    UnexpectedResponse {
        /// HTTP status code
        status: u16,
        /// Endpoint path that was requested
        endpoint: String,
    },
}

/// State database errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),
}

/// Classified failure of a single recording download
///
/// The download primitive returns this instead of an unstructured error so the retry
/// loop can decide from the classification alone whether another attempt makes sense.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Worth retrying: timeouts, dropped connections, server errors, rate limiting
    #[error("{0}")]
    Transient(String),

    /// Retrying cannot help: recording missing, access denied, malformed response
    #[error("{0}")]
    Permanent(String),
}

impl FetchError {
    /// Classify a non-success HTTP status
    pub fn from_status(status: reqwest::StatusCode, context: &str) -> Self {
        let message = format!("HTTP {} {}", status.as_u16(), context);
        if status.is_server_error()
            || status == reqwest::StatusCode::TOO_MANY_REQUESTS
            || status == reqwest::StatusCode::REQUEST_TIMEOUT
            || status == reqwest::StatusCode::UNAUTHORIZED
        {
            FetchError::Transient(message)
        } else {
            FetchError::Permanent(message)
        }
    }

    /// Classify a transport-level reqwest error
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return Self::from_status(status, "");
        }
        if err.is_builder() {
            FetchError::Permanent(format!("invalid request: {}", err))
        } else if err.is_decode() {
            FetchError::Permanent(format!("malformed response: {}", err))
        } else {
            FetchError::Transient(err.to_string())
        }
    }

    /// Classify a local file-system error while writing a recording
    pub fn from_io(err: &std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::PermissionDenied | std::io::ErrorKind::InvalidInput => {
                FetchError::Permanent(err.to_string())
            }
            _ => FetchError::Transient(err.to_string()),
        }
    }

    /// Human-readable reason without the classification prefix
    pub fn reason(&self) -> &str {
        match self {
            FetchError::Transient(reason) | FetchError::Permanent(reason) => reason,
        }
    }
}

impl From<tokio::time::error::Elapsed> for FetchError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        FetchError::Transient("timed out".to_string())
    }
}
