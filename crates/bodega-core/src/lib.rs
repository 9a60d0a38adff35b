//! # bodega-core: Pure Business Logic for the Bodega Back-Office
//!
//! This crate holds the rules of the back-office as pure functions with
//! zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Bodega Back-Office Architecture                    │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    backoffice (app crate)                        │   │
//! │  │   catalog • audit • sales • search • reports • company • CLI    │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ bodega-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐  │   │
//! │  │   │  types  │ │  money  │ │  audit  │ │ search  │ │ report  │  │   │
//! │  │   │ Product │ │  Money  │ │  diffs  │ │ ratios  │ │ layout  │  │   │
//! │  │   │  Sale   │ │         │ │         │ │         │ │         │  │   │
//! │  │   └─────────┘ └─────────┘ └─────────┘ └─────────┘ └─────────┘  │   │
//! │  │   ┌─────────┐ ┌──────────┐ ┌─────────┐                          │   │
//! │  │   │ access  │ │validation│ │ filter  │                          │   │
//! │  │   └─────────┘ └──────────┘ └─────────┘                          │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO FILES • PURE FUNCTIONS             │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                   bodega-db (Database Layer)                    │   │
//! │  │              SQLite queries, migrations, repositories           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain records (Category, Product, Sale, HistoryEntry, ...)
//! - [`money`] - Money type in integer cents
//! - [`access`] - Actor, session and permission checks
//! - [`validation`] - Form field rules
//! - [`audit`] - Product change diffs and history texts
//! - [`search`] - Similarity ratio and "did you mean" suggestions
//! - [`filter`] - Sales report / validation filters
//! - [`report`] - Paginated layout of the sales report and receipts
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use bodega_core::money::Money;
//!
//! let price = Money::parse("1,250.50").unwrap();
//! assert_eq!(price.cents(), 125_050);
//! assert_eq!(price.multiply_quantity(2).to_string(), "$2,501");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod access;
pub mod audit;
pub mod error;
pub mod filter;
pub mod money;
pub mod report;
pub mod search;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use access::{Actor, Landing, Session};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use types::*;
