//! Error types for the literature pipeline

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// What kind of entity a `NotFound` refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Missing {
    Document,
    Index,
    Conversation,
    Section,
}

impl std::fmt::Display for Missing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Missing::Document => "Document",
            Missing::Index => "Index for document",
            Missing::Conversation => "Conversation",
            Missing::Section => "Section",
        };
        f.write_str(name)
    }
}

/// Pipeline errors
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// No parser is registered for the uploaded content
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// The parser recognised the format but could not read the content
    #[error("Failed to parse '{filename}': {message}")]
    ParseFailure { filename: String, message: String },

    /// Requested entity does not exist
    #[error("{what} not found: {id}")]
    NotFound { what: Missing, id: String },

    /// The stored index was built by an embedder the query cannot be compared with
    #[error("Stale index: {0}")]
    StaleIndex(String),

    /// Prompt could not be assembled within the character budget
    #[error("Prompt budget of {budget} chars exceeded (needs at least {required})")]
    BudgetExceeded { budget: usize, required: usize },

    /// Upstream model API failed in a way that may succeed on retry
    #[error("Model API temporarily unavailable: {0}")]
    GatewayTransient(String),

    /// Upstream model API rejected the request (auth, quota, bad request)
    #[error("Model API rejected the request: {0}")]
    GatewayFatal(String),

    /// Filesystem error
    #[error("Storage error: {0}")]
    StorageIo(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Malformed or disallowed request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Template id outside the registered set
    #[error("Unknown template: {0}")]
    UnknownTemplate(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a parse failure
    pub fn parse_failure(filename: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ParseFailure {
            filename: filename.into(),
            message: message.into(),
        }
    }

    /// Create a not-found error
    pub fn not_found(what: Missing, id: impl ToString) -> Self {
        Self::NotFound {
            what,
            id: id.to_string(),
        }
    }

    /// Create a transient gateway error
    pub fn transient(message: impl Into<String>) -> Self {
        Self::GatewayTransient(message.into())
    }

    /// Create a fatal gateway error
    pub fn fatal(message: impl Into<String>) -> Self {
        Self::GatewayFatal(message.into())
    }

    /// Create an invalid request error
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Whether a retry might succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::GatewayTransient(_))
    }

    /// Stable machine-readable kind, surfaced as `error_kind` by the API
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Config(_) => "config",
            Error::UnsupportedFormat(_) => "unsupported_format",
            Error::ParseFailure { .. } => "parse_failure",
            Error::NotFound { .. } => "not_found",
            Error::StaleIndex(_) => "stale_index",
            Error::BudgetExceeded { .. } => "budget_exceeded",
            Error::GatewayTransient(_) => "gateway_transient",
            Error::GatewayFatal(_) => "gateway_fatal",
            Error::StorageIo(_) => "storage_io",
            Error::Serialization(_) => "serialization",
            Error::InvalidRequest(_) => "invalid_request",
            Error::UnknownTemplate(_) => "unknown_template",
            Error::Internal(_) => "internal",
        }
    }

    /// HTTP status used when the error reaches the API layer
    pub fn status(&self) -> StatusCode {
        match self {
            Error::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::UnsupportedFormat(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Error::ParseFailure { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::StaleIndex(_) => StatusCode::CONFLICT,
            Error::BudgetExceeded { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Error::GatewayTransient(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::GatewayFatal(_) => StatusCode::BAD_GATEWAY,
            Error::StorageIo(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Error::UnknownTemplate(_) => StatusCode::BAD_REQUEST,
            Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        // Connection resets, timeouts and truncated bodies are worth another attempt.
        if err.is_timeout() || err.is_connect() || err.is_request() || err.is_body() || err.is_decode() {
            Error::GatewayTransient(err.to_string())
        } else {
            Error::GatewayFatal(err.to_string())
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("{} ({})", self, self.kind());
        }

        let body = Json(json!({
            "error_kind": self.kind(),
            "message": self.to_string(),
        }));

        (status, body).into_response()
    }
}
