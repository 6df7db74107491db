/// Unified error handling for portgate
///
/// Every local validation failure is handled at the tier that detects it and
/// rendered as a `{code: -1, description}` JSON body with a conventional HTTP
/// status. Downstream transport failures are the one category that is not
/// recovered locally.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::fmt;
use std::io;
use std::net::AddrParseError;
use thiserror::Error;

use crate::core::session::SessionError;
use crate::protocol::ApiResponse;

/// Main error type for portgate operations
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Bad or missing JSON fields
    #[error("unable to parse request: {0}")]
    MalformedRequest(String),

    /// No session or session not logged in
    #[error("user is not logged in")]
    AuthRequired,

    /// Login attempted on a session that is already logged in
    #[error("user '{login}' is already logged in")]
    AuthConflict { login: String },

    /// Mock credential rule rejected the login/password pair
    #[error("invalid login or password")]
    InvalidCredentials,

    /// First path segment does not name a known tier
    #[error("could not transfer request with path '{path}'")]
    UnroutablePath { path: String },

    /// Path outside the versioned API prefix
    #[error("no route for path '{path}'")]
    NotFound { path: String },

    /// A backend pool was configured without members
    #[error("backend pool '{pool}' has no endpoints")]
    EmptyPool { pool: String },

    /// Transport failure talking to the next tier
    #[error("downstream error: {0}")]
    Downstream(#[from] reqwest::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Network-related errors
    #[error("Network error: {0}")]
    Network(#[from] io::Error),

    /// Address parsing errors
    #[error("Address parsing error: {0}")]
    AddressParse(#[from] AddrParseError),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// Result type alias for portgate operations
pub type GatewayResult<T> = Result<T, GatewayError>;

impl GatewayError {
    /// Create a malformed request error
    pub fn malformed<S: Into<String>>(message: S) -> Self {
        GatewayError::MalformedRequest(message.into())
    }

    /// Create an unroutable path error
    pub fn unroutable<S: Into<String>>(path: S) -> Self {
        GatewayError::UnroutablePath { path: path.into() }
    }

    /// Create an empty pool error
    pub fn empty_pool<S: Into<String>>(pool: S) -> Self {
        GatewayError::EmptyPool { pool: pool.into() }
    }

    /// HTTP status the error is reported with
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::MalformedRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::UnroutablePath { .. } => StatusCode::BAD_REQUEST,
            GatewayError::AuthRequired => StatusCode::UNAUTHORIZED,
            GatewayError::AuthConflict { .. } => StatusCode::UNAUTHORIZED,
            GatewayError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            GatewayError::NotFound { .. } => StatusCode::NOT_FOUND,
            GatewayError::Downstream(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable human-readable description sent back to callers
    pub fn description(&self) -> String {
        match self {
            GatewayError::MalformedRequest(_) => "unable to parse request!".to_string(),
            GatewayError::AuthRequired => "user is not logged in!".to_string(),
            GatewayError::AuthConflict { .. } => "already logged in!".to_string(),
            GatewayError::InvalidCredentials => "invalid login or password!".to_string(),
            GatewayError::UnroutablePath { .. } => "could not transfer request!".to_string(),
            GatewayError::NotFound { .. } => "not found!".to_string(),
            other => other.to_string(),
        }
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            GatewayError::Config(_) => ErrorSeverity::Critical,
            GatewayError::EmptyPool { .. } => ErrorSeverity::Critical,
            GatewayError::Downstream(_) => ErrorSeverity::Error,
            GatewayError::Network(_) => ErrorSeverity::Error,
            GatewayError::AddressParse(_) => ErrorSeverity::Error,
            _ => ErrorSeverity::Warning,
        }
    }
}

impl From<SessionError> for GatewayError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::AlreadyLoggedIn { login } => GatewayError::AuthConflict { login },
            SessionError::InvalidCredentials => GatewayError::InvalidCredentials,
            SessionError::NotLoggedIn => GatewayError::AuthRequired,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        match self.severity() {
            ErrorSeverity::Critical | ErrorSeverity::Error => {
                tracing::error!(error = %self, "request failed");
            }
            ErrorSeverity::Warning => tracing::warn!(error = %self, "request rejected"),
            ErrorSeverity::Info => tracing::info!(error = %self, "request rejected"),
        }

        let body = ApiResponse::error(self.description());
        (self.status(), Json(body)).into_response()
    }
}

/// Error severity levels for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Errors that prevent the process from serving at all
    Critical,
    /// Errors that fail a request through no fault of the caller
    Error,
    /// Caller-side rejections
    Warning,
    /// Informational messages about recoverable issues
    Info,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorSeverity::Critical => write!(f, "CRITICAL"),
            ErrorSeverity::Error => write!(f, "ERROR"),
            ErrorSeverity::Warning => write!(f, "WARNING"),
            ErrorSeverity::Info => write!(f, "INFO"),
        }
    }
}
