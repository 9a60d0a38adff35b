//! # bodega-db: Database Layer for the Bodega Back-Office
//!
//! This crate provides database access for the back-office.
//! It uses SQLite for storage with sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Bodega Back-Office Data Flow                       │
//! │                                                                         │
//! │  Service operation (create_sale)                                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    bodega-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │               │    │  (embedded)  │  │   │
//! │  │   │               │    │ CategoryRepo  │    │              │  │   │
//! │  │   │ SqlitePool    │    │ ProductRepo   │    │ 001_initial_ │  │   │
//! │  │   │ Connection    │◄───│ HistoryRepo   │    │   schema.sql │  │   │
//! │  │   │ Management    │    │ SaleRepo ...  │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database                             │   │
//! │  │   <data dir>/com.bodega.backoffice/bodega.db                   │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations (catalog, history, sales, ...)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bodega_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/bodega.db")).await?;
//!
//! let products = db.products().search("mouse").await?;
//! let sale = db.sales().create_with_lines(&new_sale, &lines).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::category::{CategoryRepository, CategoryUpdate, NewCategory};
pub use repository::company::{CompanyRepository, CompanyUpdate};
pub use repository::history::{HistoryRepository, NewHistoryEntry};
pub use repository::product::{NewProduct, ProductRepository, ProductUpdate};
pub use repository::sale::{NewSale, NewSaleLine, SaleCriteria, SaleRepository, SaleSummary};
pub use repository::user::{NewUser, UserRepository};
