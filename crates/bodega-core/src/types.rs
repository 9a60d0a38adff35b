//! # Domain Types
//!
//! Core domain types used throughout the back-office.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  Catalog                          Sale Ledger                           │
//! │  ┌──────────────┐                 ┌──────────────┐                      │
//! │  │  Category    │ 1            *  │    Sale      │ 1                 *  │
//! │  │  name, image │◄──┐             │  customer    │◄──────┐              │
//! │  └──────────────┘   │ cascade     │  seller      │       │ cascade      │
//! │  ┌──────────────┐   │             │  total (Σ)   │  ┌────┴─────────┐    │
//! │  │  Product     │───┘             └──────────────┘  │  SaleLine    │    │
//! │  │  price, qty  │◄───── weak (SET NULL) ────────────│  name snap   │    │
//! │  └──────┬───────┘                                   │  qty × price │    │
//! │         │ weak (SET NULL)                           └──────────────┘    │
//! │  ┌──────▼───────┐                 ┌──────────────┐                      │
//! │  │ HistoryEntry │  append-only    │CompanyProfile│  singleton           │
//! │  └──────────────┘                 └──────────────┘                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Weak References
//! `SaleLine.product_id` and `HistoryEntry.product_id` are `Option<i64>`:
//! the row survives product deletion and keeps a denormalized name, so the
//! reference must never be assumed to resolve.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;

/// Display name used for sale lines whose product name was never captured.
pub const REMOVED_PRODUCT_NAME: &str = "Product removed";

/// Default company name until the profile is edited.
pub const DEFAULT_COMPANY_NAME: &str = "Your company";

// =============================================================================
// User
// =============================================================================

/// A local copy of an identity-provider user.
///
/// Only the attributes the back-office needs are kept: the staff and
/// superuser flags. Group memberships live in their own table.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub is_staff: bool,
    pub is_superuser: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Catalog
// =============================================================================

/// A product category (brand).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Category {
    pub id: i64,
    pub name: String,
    /// Storage reference (`categories/...`).
    pub image: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    pub created_by: Option<i64>,
    pub updated_by: Option<i64>,
}

/// A product in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    /// Unit price in cents.
    pub price_cents: i64,
    /// Units in stock. Never negative.
    pub quantity: i64,
    /// Storage reference (`products/...`).
    pub image: Option<String>,
    pub category_id: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    pub created_by: Option<i64>,
    pub updated_by: Option<i64>,
}

impl Product {
    /// Returns the unit price as Money.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }
}

// =============================================================================
// Audit Trail
// =============================================================================

/// Kind of product lifecycle event recorded in the history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Created,
    Edited,
    Deleted,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeKind::Created => write!(f, "Created"),
            ChangeKind::Edited => write!(f, "Edited"),
            ChangeKind::Deleted => write!(f, "Deleted"),
        }
    }
}

/// One immutable row of the product audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct HistoryEntry {
    pub id: i64,
    /// Null once the product has been deleted.
    pub product_id: Option<i64>,
    /// Name at the time of the event, kept after deletion.
    pub product_name: String,
    pub user_id: Option<i64>,
    pub kind: ChangeKind,
    /// Rendered detail (one line per change, may contain `<img>` markup).
    pub detail: String,
    /// JSON-encoded `Vec<FieldChange>` for edits.
    pub changes: Option<String>,
    /// Storage reference of the snapshot image (`history/...` on delete).
    pub image: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl HistoryEntry {
    /// Decodes the structured change list of an `Edited` entry.
    ///
    /// Entries without a change list (or with a malformed one) yield an
    /// empty vector; the rendered `detail` remains authoritative.
    pub fn field_changes(&self) -> Vec<crate::audit::FieldChange> {
        self.changes
            .as_deref()
            .and_then(|json| serde_json::from_str(json).ok())
            .unwrap_or_default()
    }
}

// =============================================================================
// Company Profile
// =============================================================================

/// The single company record printed on reports and receipts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CompanyProfile {
    pub name: String,
    pub tax_id: Option<String>,
    pub email: Option<String>,
    /// Storage reference (`company/...`).
    pub logo: Option<String>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Payment Method
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    #[default]
    Cash,
    Card,
    Transfer,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 3] = [
        PaymentMethod::Cash,
        PaymentMethod::Card,
        PaymentMethod::Transfer,
    ];

    /// Storage / query-string code.
    pub fn code(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::Transfer => "transfer",
        }
    }

    /// Label printed on reports.
    pub fn label(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "Cash",
            PaymentMethod::Card => "Card",
            PaymentMethod::Transfer => "Transfer",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Accepts the storage codes and the legacy Spanish codes
/// (`efectivo`, `tarjeta`, `transferencia`) still sent by older forms.
impl FromStr for PaymentMethod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cash" | "efectivo" => Ok(PaymentMethod::Cash),
            "card" | "tarjeta" => Ok(PaymentMethod::Card),
            "transfer" | "transferencia" => Ok(PaymentMethod::Transfer),
            _ => Err(ValidationError::NotAllowed {
                field: "payment method".to_string(),
                allowed: PaymentMethod::ALL
                    .iter()
                    .map(|m| m.code().to_string())
                    .collect(),
            }),
        }
    }
}

// =============================================================================
// Sale Ledger
// =============================================================================

/// A sale header. `total_cents` is derived from the lines and is only ever
/// written by the ledger's recompute step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Sale {
    pub id: i64,
    pub customer: String,
    pub seller_id: i64,
    pub payment_method: PaymentMethod,
    pub total_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    pub created_by: Option<i64>,
    pub updated_by: Option<i64>,
}

impl Sale {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

/// A line of a sale.
/// Uses the snapshot pattern to freeze the product name at time of sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SaleLine {
    pub id: i64,
    pub sale_id: i64,
    /// Null once the product has been deleted.
    pub product_id: Option<i64>,
    pub product_name: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    /// Always `quantity × unit_price_cents`.
    pub subtotal_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl SaleLine {
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    #[inline]
    pub fn subtotal(&self) -> Money {
        Money::from_cents(self.subtotal_cents)
    }

    /// Name to print for this line.
    pub fn display_name(&self) -> &str {
        if self.product_name.trim().is_empty() {
            REMOVED_PRODUCT_NAME
        } else {
            &self.product_name
        }
    }
}

/// A sale together with its lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleDetail {
    pub sale: Sale,
    pub lines: Vec<SaleLine>,
}

impl SaleDetail {
    /// Sum of the line subtotals; equals `sale.total()` for persisted sales.
    pub fn lines_total(&self) -> Money {
        self.lines.iter().map(SaleLine::subtotal).sum()
    }
}

// =============================================================================
// Form Inputs
// =============================================================================

/// Raw bytes of an uploaded image plus the client-side file name.
#[derive(Clone, Serialize, Deserialize)]
pub struct ImageUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl fmt::Debug for ImageUpload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageUpload")
            .field("file_name", &self.file_name)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl ImageUpload {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        ImageUpload {
            file_name: file_name.into(),
            bytes,
        }
    }

    /// Lower-cased extension of the file name, if any.
    pub fn extension(&self) -> Option<String> {
        self.file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_lowercase())
            .filter(|ext| !ext.is_empty())
    }
}

/// What an edit form asks to do with an image field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub enum ImageChange {
    /// Leave the stored image untouched.
    #[default]
    Keep,
    /// Store a new upload in place of the current image.
    Replace(ImageUpload),
    /// Remove the image reference.
    Clear,
}

impl ImageChange {
    pub fn upload(&self) -> Option<&ImageUpload> {
        match self {
            ImageChange::Replace(upload) => Some(upload),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategoryForm {
    pub name: String,
    #[serde(default)]
    pub image: ImageChange,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductForm {
    pub name: String,
    pub description: Option<String>,
    pub price: Money,
    pub quantity: i64,
    pub category_id: i64,
    #[serde(default)]
    pub image: ImageChange,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompanyForm {
    pub name: String,
    pub tax_id: Option<String>,
    pub email: Option<String>,
    #[serde(default)]
    pub logo: ImageChange,
}

/// One requested line of a new sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleLineInput {
    pub product_id: i64,
    pub quantity: i64,
    /// Falls back to the product price when absent or zero.
    pub unit_price: Option<Money>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleForm {
    pub customer: String,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    pub lines: Vec<SaleLineInput>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn line(name: &str) -> SaleLine {
        SaleLine {
            id: 1,
            sale_id: 1,
            product_id: None,
            product_name: name.to_string(),
            quantity: 2,
            unit_price_cents: 150,
            subtotal_cents: 300,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_payment_method_parsing() {
        assert_eq!("cash".parse::<PaymentMethod>().unwrap(), PaymentMethod::Cash);
        assert_eq!("Tarjeta".parse::<PaymentMethod>().unwrap(), PaymentMethod::Card);
        assert_eq!(
            "transferencia".parse::<PaymentMethod>().unwrap(),
            PaymentMethod::Transfer
        );
        assert!("bitcoin".parse::<PaymentMethod>().is_err());
        assert_eq!(PaymentMethod::default(), PaymentMethod::Cash);
    }

    #[test]
    fn test_display_name_falls_back_to_sentinel() {
        assert_eq!(line("Mouse").display_name(), "Mouse");
        assert_eq!(line("  ").display_name(), REMOVED_PRODUCT_NAME);
    }

    #[test]
    fn test_image_upload_extension() {
        assert_eq!(
            ImageUpload::new("photo.JPG", vec![]).extension().as_deref(),
            Some("jpg")
        );
        assert_eq!(ImageUpload::new("noext", vec![]).extension(), None);
        assert_eq!(ImageUpload::new("trailing.", vec![]).extension(), None);
    }

    #[test]
    fn test_lines_total() {
        let detail = SaleDetail {
            sale: Sale {
                id: 1,
                customer: "Ana".to_string(),
                seller_id: 1,
                payment_method: PaymentMethod::Cash,
                total_cents: 600,
                created_at: Utc::now(),
                updated_at: Utc::now(),
                created_by: None,
                updated_by: None,
            },
            lines: vec![line("A"), line("B")],
        };
        assert_eq!(detail.lines_total(), detail.sale.total());
    }
}
