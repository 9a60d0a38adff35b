//! # Error Types
//!
//! Domain-specific error types for bodega-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  bodega-core errors (this file)                                        │
//! │  ├── CoreError        - Business rule / permission failures            │
//! │  └── ValidationError  - Form input failures (before any mutation)      │
//! │                                                                         │
//! │  bodega-db errors (separate crate)                                     │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  back-office errors (in app)                                           │
//! │  └── ApiError         - What callers see (code + message)              │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → ApiError ← DbError                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// These errors represent business rule violations, permission failures
/// and references to records that do not exist.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Product id does not resolve.
    #[error("Product not found: {0}")]
    ProductNotFound(i64),

    /// Category id does not resolve.
    #[error("Category not found: {0}")]
    CategoryNotFound(i64),

    /// Sale id does not resolve.
    #[error("Sale not found: {0}")]
    SaleNotFound(i64),

    /// Sale line id does not resolve.
    #[error("Sale line not found: {0}")]
    SaleLineNotFound(i64),

    /// User id or username does not resolve.
    #[error("User not found: {0}")]
    UserNotFound(String),

    /// Requested quantity is larger than the recorded stock.
    ///
    /// ## User Workflow
    /// ```text
    /// Sale form line (qty: 5)
    ///      │
    ///      ▼
    /// Check stock: available=3
    ///      │
    ///      ▼
    /// InsufficientStock { product: "Mouse", available: 3, requested: 5 }
    ///      │
    ///      ▼
    /// Form shows: "Insufficient stock for Mouse"
    /// ```
    #[error("Insufficient stock for {product}: available {available}, requested {requested}")]
    InsufficientStock {
        product: String,
        available: i64,
        requested: i64,
    },

    /// No session is attached to the request.
    #[error("Authentication required")]
    NotAuthenticated,

    /// The actor is logged in but may not perform the action.
    #[error("{username} is not allowed to {action}")]
    Forbidden { username: String, action: String },

    /// The company profile has never been filled in.
    #[error("Company profile is not configured")]
    CompanyNotConfigured,

    /// An export was requested for a filter without matching sales.
    #[error("There are no sales records in the selected date range")]
    NoMatchingSales,

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when user input doesn't meet requirements.
/// They are always raised before any state is mutated.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be greater than 0")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid date, invalid amount).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    /// Range bounds are inverted.
    #[error("{start_field} cannot be after {end_field}")]
    InvalidRange {
        start_field: String,
        end_field: String,
    },
}

impl ValidationError {
    /// Shorthand for a `Required` error.
    pub fn required(field: impl Into<String>) -> Self {
        ValidationError::Required {
            field: field.into(),
        }
    }

    /// Shorthand for an `InvalidFormat` error.
    pub fn invalid_format(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::InvalidFormat {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InsufficientStock {
            product: "Mouse".to_string(),
            available: 3,
            requested: 5,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for Mouse: available 3, requested 5"
        );

        let err = CoreError::Forbidden {
            username: "ana".to_string(),
            action: "delete products".to_string(),
        };
        assert_eq!(err.to_string(), "ana is not allowed to delete products");
    }

    #[test]
    fn test_validation_error_messages() {
        assert_eq!(
            ValidationError::required("customer").to_string(),
            "customer is required"
        );

        let err = ValidationError::MustBePositive {
            field: "quantity".to_string(),
        };
        assert_eq!(err.to_string(), "quantity must be greater than 0");

        let err = ValidationError::InvalidRange {
            start_field: "start date".to_string(),
            end_field: "end date".to_string(),
        };
        assert_eq!(err.to_string(), "start date cannot be after end date");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let core_err: CoreError = ValidationError::required("name").into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
