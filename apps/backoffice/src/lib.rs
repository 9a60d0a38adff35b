//! # Bodega Back-Office
//!
//! Service layer of the inventory and sales back-office: catalog
//! maintenance with an audit trail, the sales ledger with guarded stock,
//! fuzzy search suggestions and printable reports.
//!
//! ## Module Organization
//! ```text
//! bodega_backoffice/
//! ├── lib.rs          ◄─── You are here (exports)
//! ├── config.rs       ◄─── AppConfig: defaults → bodega.toml → BODEGA_* env
//! ├── state.rs        ◄─── AppContext: database, storage, company cache
//! ├── error.rs        ◄─── ApiError / ErrorCode for every operation
//! ├── storage.rs      ◄─── FileStorage port (local disk, in-memory)
//! ├── imaging.rs      ◄─── Upload downscaling (image crate)
//! └── services/
//!     ├── catalog.rs  ◄─── Categories and products (admin writes)
//!     ├── audit.rs    ◄─── Product history entries
//!     ├── sales.rs    ◄─── Sales and sale lines
//!     ├── search.rs   ◄─── List searches with suggestions
//!     ├── reports.rs  ◄─── Sales report and receipt layouts
//!     └── company.rs  ◄─── Company profile
//! ```
//!
//! ## Usage
//! ```text
//! let config = AppConfig::load(None)?;
//! let ctx = AppContext::from_config(&config).await?;
//! let session = ctx.session_for("maria").await?;
//!
//! let sale = ctx.sales().create_sale(&session, form).await?;
//! let receipt = ctx.reports().receipt(&session, sale.sale.id).await?;
//! ```
//!
//! Authentication happens outside this crate; callers resolve the logged-in
//! username into a [`Session`](bodega_core::Session) with
//! [`AppContext::session_for`].

pub mod config;
pub mod error;
pub mod imaging;
pub mod services;
pub mod state;
pub mod storage;

// Re-exports
pub use config::AppConfig;
pub use error::{ApiError, ApiResult, ErrorCode};
pub use state::AppContext;
pub use storage::{FileStorage, LocalFileStorage, MemoryFileStorage};
