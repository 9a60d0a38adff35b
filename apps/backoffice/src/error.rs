//! # API Error Type
//!
//! Unified error type for service operations.
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in the Back-Office                        │
//! │                                                                         │
//! │  Caller (web layer / CLI)          Service layer                        │
//! │  ────────────────────────          ─────────────                        │
//! │                                                                         │
//! │  sales.create_sale(...)                                                 │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │  Service Function                                                │  │
//! │  │  Result<T, ApiError>                                             │  │
//! │  │         │                                                        │  │
//! │  │         ▼                                                        │  │
//! │  │  Permission? ──── CoreError::Forbidden ──────────┐              │  │
//! │  │         │                                        │              │  │
//! │  │         ▼                                        ▼              │  │
//! │  │  Validation? ──── ValidationError ──────────── ApiError ───────►│  │
//! │  │         │                                        ▲              │  │
//! │  │         ▼                                        │              │  │
//! │  │  Database? ────── DbError::InsufficientStock ────┘              │  │
//! │  │         │                                                        │  │
//! │  │         ▼                                                        │  │
//! │  │  Success ──────────────────────────────────────────────────────►│  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! │                                                                         │
//! │  { "code": "INSUFFICIENT_STOCK",                                        │
//! │    "message": "Insufficient stock for Mouse: available 3, requested 5" }│
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A web layer maps `ErrorCode::http_status()` onto its responses; the CLI
//! prints the message.

use serde::Serialize;
use tracing::{error, warn};

use crate::imaging::ImagingError;
use crate::storage::StorageError;
use bodega_core::{CoreError, ValidationError};
use bodega_db::DbError;

/// Error returned by every service operation.
///
/// ## Serialization
/// ```json
/// {
///   "code": "NOT_FOUND",
///   "message": "Sale not found: 42"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Machine-readable error code for programmatic handling
    pub code: ErrorCode,

    /// Human-readable error message for display
    pub message: String,
}

/// Error codes for service responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Resource not found (404)
    NotFound,

    /// Input validation failed (400)
    ValidationError,

    /// Logged in, but not allowed (403)
    Forbidden,

    /// No session (401)
    Unauthenticated,

    /// Requested more units than the product has (409)
    InsufficientStock,

    /// An export matched no sales (404)
    NoRecords,

    /// The company profile was never saved (503)
    NotConfigured,

    /// Database operation failed (500)
    DatabaseError,

    /// Media storage failed (500)
    StorageError,

    /// Internal server error (500)
    Internal,
}

impl ErrorCode {
    /// HTTP status a web layer should answer with.
    pub fn http_status(&self) -> u16 {
        match self {
            ErrorCode::NotFound => 404,
            ErrorCode::ValidationError => 400,
            ErrorCode::Forbidden => 403,
            ErrorCode::Unauthenticated => 401,
            ErrorCode::InsufficientStock => 409,
            ErrorCode::NoRecords => 404,
            ErrorCode::NotConfigured => 503,
            ErrorCode::DatabaseError => 500,
            ErrorCode::StorageError => 500,
            ErrorCode::Internal => 500,
        }
    }
}

impl ApiError {
    /// Creates a new API error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
        }
    }

    /// Creates a not found error.
    pub fn not_found(resource: &str, id: impl std::fmt::Display) -> Self {
        ApiError::new(ErrorCode::NotFound, format!("{} not found: {}", resource, id))
    }

    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::ValidationError, message)
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Internal, message)
    }

    pub fn is_not_found(&self) -> bool {
        self.code == ErrorCode::NotFound
    }
}

/// Converts database errors to API errors.
impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => ApiError::not_found(&entity, id),
            DbError::UniqueViolation { field, value } => ApiError::new(
                ErrorCode::ValidationError,
                format!("{} '{}' already exists", field, value),
            ),
            DbError::InsufficientStock {
                product_id,
                requested,
            } => ApiError::new(
                ErrorCode::InsufficientStock,
                format!(
                    "Insufficient stock for product {}: requested {}",
                    product_id, requested
                ),
            ),
            DbError::ForeignKeyViolation { message } => {
                warn!("Foreign key violation: {}", message);
                ApiError::new(ErrorCode::ValidationError, "Invalid reference")
            }
            DbError::ConnectionFailed(_) => {
                ApiError::new(ErrorCode::DatabaseError, "Database connection failed")
            }
            DbError::MigrationFailed(e) => {
                error!("Database migration failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database migration failed")
            }
            DbError::QueryFailed(e) => {
                // Log the actual error but return a generic message
                error!("Database query failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
            DbError::TransactionFailed(e) => {
                error!("Transaction failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database transaction failed")
            }
            DbError::PoolExhausted => {
                ApiError::new(ErrorCode::DatabaseError, "Database pool exhausted")
            }
            DbError::Internal(e) => {
                error!("Internal database error: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
        }
    }
}

/// Converts core errors to API errors.
impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ProductNotFound(id) => ApiError::not_found("Product", id),
            CoreError::CategoryNotFound(id) => ApiError::not_found("Category", id),
            CoreError::SaleNotFound(id) => ApiError::not_found("Sale", id),
            CoreError::SaleLineNotFound(id) => ApiError::not_found("Sale line", id),
            CoreError::UserNotFound(name) => ApiError::not_found("User", name),
            CoreError::InsufficientStock { .. } => {
                ApiError::new(ErrorCode::InsufficientStock, err.to_string())
            }
            CoreError::NotAuthenticated => ApiError::new(ErrorCode::Unauthenticated, err.to_string()),
            CoreError::Forbidden {
                ref username,
                ref action,
            } => {
                warn!(username = %username, action = %action, "Permission denied");
                ApiError::new(ErrorCode::Forbidden, err.to_string())
            }
            CoreError::CompanyNotConfigured => ApiError::new(ErrorCode::NotConfigured, err.to_string()),
            CoreError::NoMatchingSales => ApiError::new(ErrorCode::NoRecords, err.to_string()),
            CoreError::Validation(e) => ApiError::validation(e.to_string()),
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::validation(err.to_string())
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => ApiError::not_found("File", key),
            StorageError::InvalidKey(key) => ApiError::validation(format!("Invalid file reference: {}", key)),
            StorageError::Io(e) => {
                error!("Storage I/O failed: {}", e);
                ApiError::new(ErrorCode::StorageError, "File storage failed")
            }
        }
    }
}

impl From<ImagingError> for ApiError {
    fn from(err: ImagingError) -> Self {
        ApiError::internal(err.to_string())
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

/// Result type for service operations.
pub type ApiResult<T> = Result<T, ApiError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_serialize_screaming_snake() {
        let err = ApiError::new(ErrorCode::InsufficientStock, "x");
        let json = serde_json::to_string(&err).unwrap();
        assert_eq!(json, r#"{"code":"INSUFFICIENT_STOCK","message":"x"}"#);
    }

    #[test]
    fn test_http_status() {
        assert_eq!(ErrorCode::NotFound.http_status(), 404);
        assert_eq!(ErrorCode::ValidationError.http_status(), 400);
        assert_eq!(ErrorCode::Forbidden.http_status(), 403);
        assert_eq!(ErrorCode::Unauthenticated.http_status(), 401);
        assert_eq!(ErrorCode::NotConfigured.http_status(), 503);
    }

    #[test]
    fn test_core_errors_map_to_codes() {
        let forbidden: ApiError = CoreError::Forbidden {
            username: "ana".to_string(),
            action: "delete products".to_string(),
        }
        .into();
        assert_eq!(forbidden.code, ErrorCode::Forbidden);
        assert_eq!(forbidden.message, "ana is not allowed to delete products");

        let missing: ApiError = CoreError::SaleNotFound(7).into();
        assert_eq!(missing.message, "Sale not found: 7");

        let empty: ApiError = CoreError::NoMatchingSales.into();
        assert_eq!(empty.code, ErrorCode::NoRecords);

        let invalid: ApiError = ValidationError::required("customer").into();
        assert_eq!(invalid.code, ErrorCode::ValidationError);
    }

    #[test]
    fn test_db_errors_hide_internals() {
        let err: ApiError = DbError::QueryFailed("syntax error near FROM".to_string()).into();
        assert_eq!(err.code, ErrorCode::DatabaseError);
        assert!(!err.message.contains("syntax"));

        let err: ApiError = DbError::InsufficientStock {
            product_id: 3,
            requested: 9,
        }
        .into();
        assert_eq!(err.code, ErrorCode::InsufficientStock);
    }
}
