//! # Validation Module
//!
//! Form-level validation for the back-office.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Service (Rust)                                               │
//! │  └── THIS MODULE: every form field, before any mutation                │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Repository transaction                                       │
//! │  └── guarded stock decrement (quantity >= requested)                   │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── NOT NULL / CHECK constraints                                      │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::NaiveDate;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::ImageUpload;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Maximum length of names (products, categories, customers, company).
pub const MAX_NAME_LEN: usize = 100;

/// Maximum length of a product description.
pub const MAX_DESCRIPTION_LEN: usize = 2000;

/// Largest price accepted: ten digits with two decimals (99,999,999.99).
pub const MAX_PRICE_CENTS: i64 = 9_999_999_999;

/// Largest line subtotal or sale total, same ten-digit bound as prices.
pub const MAX_AMOUNT_CENTS: i64 = 9_999_999_999;

/// Largest stock level a product can hold.
pub const MAX_STOCK: i64 = 2_147_483_647;

/// File extensions accepted for uploaded images.
pub const ALLOWED_IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "webm"];

/// Date format used by report filters.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

// =============================================================================
// String Validators
// =============================================================================

/// Validates a required name field and returns it trimmed.
///
/// ## Example
/// ```rust
/// use bodega_core::validation::validate_name;
///
/// assert_eq!(validate_name("name", "  Mouse ").unwrap(), "Mouse");
/// assert!(validate_name("name", "   ").is_err());
/// ```
pub fn validate_name(field: &str, value: &str) -> ValidationResult<String> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::required(field));
    }

    if value.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_NAME_LEN,
        });
    }

    Ok(value.to_string())
}

/// Validates an optional free-text description. Blank becomes `None`.
pub fn validate_description(value: Option<&str>) -> ValidationResult<Option<String>> {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };

    if value.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(ValidationError::TooLong {
            field: "description".to_string(),
            max: MAX_DESCRIPTION_LEN,
        });
    }

    Ok(Some(value.to_string()))
}

/// Validates a search query.
///
/// ## Rules
/// - Can be empty (lists everything)
/// - Maximum 100 characters
///
/// ## Returns
/// The trimmed query string.
pub fn validate_search_query(query: &str) -> ValidationResult<String> {
    let query = query.trim();

    if query.chars().count() > 100 {
        return Err(ValidationError::TooLong {
            field: "query".to_string(),
            max: 100,
        });
    }

    Ok(query.to_string())
}

/// Validates an optional email address. Blank becomes `None`.
pub fn validate_email(value: Option<&str>) -> ValidationResult<Option<String>> {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };

    let valid = match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !value.chars().any(char::is_whitespace)
        }
        None => false,
    };

    if !valid {
        return Err(ValidationError::invalid_format("email", "not an email address"));
    }

    Ok(Some(value.to_string()))
}

/// Validates an optional tax id (NIT): digits, optionally with dashes.
pub fn validate_tax_id(value: Option<&str>) -> ValidationResult<Option<String>> {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };

    if value.len() > 20 {
        return Err(ValidationError::TooLong {
            field: "tax id".to_string(),
            max: 20,
        });
    }

    if !value.chars().all(|c| c.is_ascii_digit() || c == '-')
        || !value.chars().any(|c| c.is_ascii_digit())
    {
        return Err(ValidationError::invalid_format(
            "tax id",
            "must contain only digits and dashes",
        ));
    }

    Ok(Some(value.to_string()))
}

/// Validates the extension of an uploaded image.
///
/// ## Example
/// ```rust
/// use bodega_core::types::ImageUpload;
/// use bodega_core::validation::validate_image_upload;
///
/// assert!(validate_image_upload(&ImageUpload::new("a.PNG", vec![1])).is_ok());
/// assert!(validate_image_upload(&ImageUpload::new("a.gif", vec![1])).is_err());
/// ```
pub fn validate_image_upload(upload: &ImageUpload) -> ValidationResult<String> {
    if upload.bytes.is_empty() {
        return Err(ValidationError::required("image"));
    }

    match upload.extension() {
        Some(ext) if ALLOWED_IMAGE_EXTENSIONS.contains(&ext.as_str()) => Ok(ext),
        _ => Err(ValidationError::NotAllowed {
            field: "image extension".to_string(),
            allowed: ALLOWED_IMAGE_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        }),
    }
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a sale-line quantity.
///
/// ```text
/// Sale form: quantity 0 → "quantity must be greater than 0"
/// ```
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    Ok(())
}

/// Validates a stock level entered on the product form.
pub fn validate_stock(qty: i64) -> ValidationResult<()> {
    if !(0..=MAX_STOCK).contains(&qty) {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 0,
            max: MAX_STOCK,
        });
    }

    Ok(())
}

/// Validates a product price.
///
/// ## Rules
/// - Must be non-negative (>= 0)
/// - At most ten digits (99,999,999.99)
pub fn validate_price(price: Money) -> ValidationResult<()> {
    if price.cents() < 0 || price.cents() > MAX_PRICE_CENTS {
        return Err(ValidationError::OutOfRange {
            field: "price".to_string(),
            min: 0,
            max: MAX_PRICE_CENTS,
        });
    }

    Ok(())
}

/// Checks a requested quantity against the recorded stock.
///
/// The quantity itself must be positive; a positive quantity larger than
/// `available` yields `InsufficientStock`.
pub fn check_stock(product: &str, requested: i64, available: i64) -> CoreResult<()> {
    validate_quantity(requested)?;

    if requested > available {
        return Err(CoreError::InsufficientStock {
            product: product.to_string(),
            available,
            requested,
        });
    }

    Ok(())
}

fn amount_too_large(field: &str) -> ValidationError {
    ValidationError::OutOfRange {
        field: field.to_string(),
        min: 0,
        max: MAX_AMOUNT_CENTS,
    }
}

/// Subtotal of a sale line, rejected when it exceeds `MAX_AMOUNT_CENTS`.
///
/// ## Example
/// ```rust
/// use bodega_core::money::Money;
/// use bodega_core::validation::line_subtotal;
///
/// assert_eq!(line_subtotal(3, Money::from_cents(250)).unwrap().cents(), 750);
/// assert!(line_subtotal(1_000_000_000, Money::from_cents(9_999_999_999)).is_err());
/// ```
pub fn line_subtotal(quantity: i64, unit_price: Money) -> ValidationResult<Money> {
    unit_price
        .checked_multiply_quantity(quantity)
        .filter(|subtotal| (0..=MAX_AMOUNT_CENTS).contains(&subtotal.cents()))
        .ok_or_else(|| amount_too_large("subtotal"))
}

/// Sale total after adding `amount`, rejected when it exceeds `MAX_AMOUNT_CENTS`.
pub fn add_to_total(total: Money, amount: Money) -> ValidationResult<Money> {
    total
        .checked_add(amount)
        .filter(|total| total.cents() <= MAX_AMOUNT_CENTS)
        .ok_or_else(|| amount_too_large("total"))
}

// =============================================================================
// Date Validators
// =============================================================================

/// Parses a strict `YYYY-MM-DD` date.
pub fn parse_date(field: &str, value: &str) -> ValidationResult<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)
        .map_err(|_| ValidationError::invalid_format(field, "expected YYYY-MM-DD"))
}

/// Rejects ranges whose start is after their end.
pub fn validate_date_range(start: Option<NaiveDate>, end: Option<NaiveDate>) -> ValidationResult<()> {
    if let (Some(start), Some(end)) = (start, end) {
        if start > end {
            return Err(ValidationError::InvalidRange {
                start_field: "start date".to_string(),
                end_field: "end date".to_string(),
            });
        }
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
