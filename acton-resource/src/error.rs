//! Error types and HTTP response conversion
//!
//! Two layers of errors live here:
//!
//! - [`ApiError`]: the taxonomy every resource operation returns. Each kind
//!   maps to an HTTP status and a default error code, and renders as
//!   `{"code": ..., "message": ...}`.
//! - [`Error`]: framework errors raised while loading configuration,
//!   connecting to infrastructure or verifying tokens.
//!
//! # Example
//!
//! ```rust
//! use acton_resource::error::{ApiError, ApiErrorKind};
//!
//! let error = ApiError::not_found("Item", "8f0e1c52-4a3b-4f7e-9c1d-2b6a5e3f4d10");
//! assert!(matches!(error.kind, ApiErrorKind::NotFound));
//! assert_eq!(error.code, "NOT_FOUND");
//! ```

use std::fmt;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// API errors
// ============================================================================

/// Operation being performed when the API error occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiOperation {
    /// Creating a new entity
    Create,
    /// Getting a single entity by ID
    Get,
    /// Listing entities
    List,
    /// Updating an existing entity
    Update,
    /// Beginning or resolving a unit of work
    Transaction,
    /// Verifying caller credentials
    Authenticate,
    /// Checking caller permissions
    Authorize,
}

impl fmt::Display for ApiOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Get => write!(f, "get"),
            Self::List => write!(f, "list"),
            Self::Update => write!(f, "update"),
            Self::Transaction => write!(f, "transaction"),
            Self::Authenticate => write!(f, "authenticate"),
            Self::Authorize => write!(f, "authorize"),
        }
    }
}

/// Category of API error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiErrorKind {
    /// Malformed body, failed validation, unknown query fields, bad id
    InvalidPayload,
    /// Missing or invalid credentials
    Unauthorized,
    /// Caller lacks the required permission
    Forbidden,
    /// No row matched a single-entity lookup or update
    NotFound,
    /// Write or transaction failure reported by the database
    UnknownDatabase,
    /// Anything else, including unit of work misuse
    InternalServer,
}

impl fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidPayload => write!(f, "invalid_payload"),
            Self::Unauthorized => write!(f, "unauthorized"),
            Self::Forbidden => write!(f, "forbidden"),
            Self::NotFound => write!(f, "not_found"),
            Self::UnknownDatabase => write!(f, "unknown_database"),
            Self::InternalServer => write!(f, "internal_server"),
        }
    }
}

impl ApiErrorKind {
    /// Get the HTTP status code for this error kind
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidPayload => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::UnknownDatabase | Self::InternalServer => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Default error code rendered for this kind
    #[must_use]
    pub const fn default_code(&self) -> &'static str {
        match self {
            Self::InvalidPayload => "INVALID_PAYLOAD",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden => "FORBIDDEN",
            Self::NotFound => "NOT_FOUND",
            Self::UnknownDatabase => "UNKNOWN_DATABASE_ERROR",
            Self::InternalServer => "UNKNOWN_ERROR",
        }
    }

    /// Whether a client may reasonably retry after this kind of failure
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::NotFound | Self::UnknownDatabase)
    }
}

/// Structured API error with operation context
///
/// `code` starts out as the kind's default code and can be overridden with
/// [`ApiError::with_code`] when a resource needs a more specific one.
///
/// # Example
///
/// ```rust
/// use acton_resource::error::{ApiError, ApiOperation};
///
/// let error = ApiError::invalid_payload("Invalid sort direction")
///     .with_operation(ApiOperation::List)
///     .with_code("INVALID_SORT");
/// assert_eq!(error.code, "INVALID_SORT");
/// assert!(!error.is_retryable());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    /// The operation being performed when the error occurred
    pub operation: ApiOperation,
    /// The category of error
    pub kind: ApiErrorKind,
    /// Machine-readable error code
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// The type of entity involved (e.g., "Item")
    pub entity_type: Option<String>,
    /// The ID of the entity involved
    pub entity_id: Option<String>,
}

impl ApiError {
    /// Create a new API error with the kind's default code
    pub fn new(operation: ApiOperation, kind: ApiErrorKind, message: impl Into<String>) -> Self {
        Self {
            operation,
            kind,
            code: kind.default_code().to_string(),
            message: message.into(),
            entity_type: None,
            entity_id: None,
        }
    }

    /// Create an invalid payload error
    ///
    /// ```rust
    /// use acton_resource::error::ApiError;
    ///
    /// let error = ApiError::invalid_payload("Invalid id 'abc'.");
    /// assert_eq!(error.code, "INVALID_PAYLOAD");
    /// ```
    pub fn invalid_payload(message: impl Into<String>) -> Self {
        Self::new(ApiOperation::Create, ApiErrorKind::InvalidPayload, message)
    }

    /// Create an unauthorized error
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ApiOperation::Authenticate, ApiErrorKind::Unauthorized, message)
    }

    /// Create a forbidden error
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ApiOperation::Authorize, ApiErrorKind::Forbidden, message)
    }

    /// Create a "not found" error with entity context
    ///
    /// ```rust
    /// use acton_resource::error::ApiError;
    ///
    /// let error = ApiError::not_found("Item", "42");
    /// assert_eq!(error.message, "Entity with id 42 could not be found.");
    /// ```
    pub fn not_found(entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        let entity_id = entity_id.into();
        Self {
            message: format!("Entity with id {} could not be found.", entity_id),
            entity_type: Some(entity_type.into()),
            entity_id: Some(entity_id),
            ..Self::new(ApiOperation::Get, ApiErrorKind::NotFound, "")
        }
    }

    /// Create an unknown database error
    pub fn unknown_database(operation: ApiOperation, message: impl Into<String>) -> Self {
        Self::new(operation, ApiErrorKind::UnknownDatabase, message)
    }

    /// Create an internal server error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ApiOperation::Get, ApiErrorKind::InternalServer, message)
    }

    /// Override the error code
    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = code.into();
        self
    }

    /// Add entity context to an existing error
    #[must_use]
    pub fn with_entity(
        mut self,
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
    ) -> Self {
        self.entity_type = Some(entity_type.into());
        self.entity_id = Some(entity_id.into());
        self
    }

    /// Add the entity type without an id (list and create operations)
    #[must_use]
    pub fn with_entity_type(mut self, entity_type: impl Into<String>) -> Self {
        self.entity_type = Some(entity_type.into());
        self
    }

    /// Set the operation that caused the error
    #[must_use]
    pub fn with_operation(mut self, operation: ApiOperation) -> Self {
        self.operation = operation;
        self
    }

    /// HTTP status for this error
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        self.kind.status_code()
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "API {} error during {}: {}",
            self.kind, self.operation, self.message
        )?;
        match (&self.entity_type, &self.entity_id) {
            (Some(entity_type), Some(entity_id)) => write!(f, " [{}: {}]", entity_type, entity_id)?,
            (Some(entity_type), None) => write!(f, " [{}]", entity_type)?,
            _ => {}
        }
        Ok(())
    }
}

impl std::error::Error for ApiError {}

/// Failure body shared by every error response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Machine-readable error code
    pub code: String,
    /// Human-readable error message
    pub message: String,
}

impl ErrorBody {
    /// Create a new error body
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.kind.status_code();

        tracing::error!(
            operation = %self.operation,
            kind = %self.kind,
            code = %self.code,
            entity_type = ?self.entity_type,
            entity_id = ?self.entity_id,
            retryable = self.is_retryable(),
            "API error: {}", self.message
        );

        (status, Json(ErrorBody::new(self.code, self.message))).into_response()
    }
}

// ============================================================================
// Framework errors
// ============================================================================

/// Result type alias using the framework error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the framework
///
/// Large error variants are boxed to reduce stack size
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(Box<figment::Error>),

    /// Database driver error
    #[cfg(feature = "database")]
    #[error("Database error: {0}")]
    Database(Box<sqlx::Error>),

    /// Migration error
    #[cfg(feature = "database")]
    #[error("Migration error: {0}")]
    Migration(Box<sqlx::migrate::MigrateError>),

    /// JWT error (requires `jwt` feature)
    #[cfg(feature = "jwt")]
    #[error("JWT error: {0}")]
    Jwt(Box<jsonwebtoken::errors::Error>),

    /// JWKS retrieval or key selection error
    #[error("JWKS error: {0}")]
    Jwks(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal server error
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        tracing::error!(error = %self, "Framework error");

        let (status, code, message) = match self {
            Error::Config(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "CONFIG_ERROR",
                "Service misconfigured",
            ),
            #[cfg(feature = "database")]
            Error::Database(_) | Error::Migration(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiErrorKind::UnknownDatabase.default_code(),
                "Database operation failed",
            ),
            #[cfg(feature = "jwt")]
            Error::Jwt(_) => (
                StatusCode::UNAUTHORIZED,
                ApiErrorKind::Unauthorized.default_code(),
                "Invalid token.",
            ),
            Error::Jwks(_) => (
                StatusCode::UNAUTHORIZED,
                ApiErrorKind::Unauthorized.default_code(),
                "Invalid token.",
            ),
            Error::Io(_) | Error::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiErrorKind::InternalServer.default_code(),
                "Internal server error",
            ),
        };

        (status, Json(ErrorBody::new(code, message))).into_response()
    }
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Error::Config(Box::new(err))
    }
}

#[cfg(feature = "database")]
impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Error::Database(Box::new(err))
    }
}

#[cfg(feature = "database")]
impl From<sqlx::migrate::MigrateError> for Error {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        Error::Migration(Box::new(err))
    }
}

#[cfg(feature = "jwt")]
impl From<jsonwebtoken::errors::Error> for Error {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        Error::Jwt(Box::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[test]
    fn test_api_error_kind_status_codes() {
        assert_eq!(ApiErrorKind::InvalidPayload.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiErrorKind::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiErrorKind::Forbidden.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(ApiErrorKind::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiErrorKind::UnknownDatabase.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiErrorKind::InternalServer.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_api_error_kind_default_codes() {
        assert_eq!(ApiErrorKind::InvalidPayload.default_code(), "INVALID_PAYLOAD");
        assert_eq!(ApiErrorKind::Unauthorized.default_code(), "UNAUTHORIZED");
        assert_eq!(ApiErrorKind::Forbidden.default_code(), "FORBIDDEN");
        assert_eq!(ApiErrorKind::NotFound.default_code(), "NOT_FOUND");
        assert_eq!(
            ApiErrorKind::UnknownDatabase.default_code(),
            "UNKNOWN_DATABASE_ERROR"
        );
        assert_eq!(ApiErrorKind::InternalServer.default_code(), "UNKNOWN_ERROR");
    }

    #[test]
    fn test_retryable_kinds() {
        assert!(ApiError::not_found("Item", "1").is_retryable());
        assert!(ApiError::unknown_database(ApiOperation::Create, "insert failed").is_retryable());

        assert!(!ApiError::invalid_payload("bad").is_retryable());
        assert!(!ApiError::unauthorized("Invalid token.").is_retryable());
        assert!(!ApiError::forbidden("Permission denied.").is_retryable());
        assert!(!ApiError::internal("boom").is_retryable());
    }

    #[test]
    fn test_not_found_message() {
        let error = ApiError::not_found("Item", "abc");
        assert_eq!(error.operation, ApiOperation::Get);
        assert_eq!(error.message, "Entity with id abc could not be found.");
        assert_eq!(error.entity_type.as_deref(), Some("Item"));
        assert_eq!(error.entity_id.as_deref(), Some("abc"));
    }

    #[test]
    fn test_code_override() {
        let error = ApiError::invalid_payload("duplicate name").with_code("DUPLICATE_NAME");
        assert_eq!(error.kind, ApiErrorKind::InvalidPayload);
        assert_eq!(error.code, "DUPLICATE_NAME");
    }

    #[test]
    fn test_with_operation() {
        let error = ApiError::internal("null transaction").with_operation(ApiOperation::Transaction);
        assert_eq!(error.operation, ApiOperation::Transaction);
    }

    #[test]
    fn test_display() {
        let error = ApiError::not_found("Item", "7");
        let display = error.to_string();
        assert!(display.contains("not_found"));
        assert!(display.contains("get"));
        assert!(display.contains("[Item: 7]"));

        let display = ApiError::invalid_payload("bad body").to_string();
        assert_eq!(display, "API invalid_payload error during create: bad body");
    }

    #[tokio::test]
    async fn test_into_response_renders_code_and_message() {
        let response = ApiError::forbidden("Permission denied.").into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: ErrorBody = serde_json::from_slice(&body).unwrap();
        assert_eq!(body, ErrorBody::new("FORBIDDEN", "Permission denied."));
    }

    #[tokio::test]
    async fn test_into_response_uses_overridden_code() {
        let response = ApiError::unknown_database(ApiOperation::Update, "update failed")
            .with_code("ITEM_LOCKED")
            .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["code"], "ITEM_LOCKED");
        assert_eq!(json["message"], "update failed");
    }

    #[tokio::test]
    async fn test_framework_error_response_hides_details() {
        let response = Error::Internal("pool poisoned".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: ErrorBody = serde_json::from_slice(&body).unwrap();
        assert_eq!(body.code, "UNKNOWN_ERROR");
        assert!(!body.message.contains("pool poisoned"));
    }
}
