//! # Application Context
//!
//! Everything a service operation needs, created once at startup and
//! shared by every request.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    AppContext                                           │
//! │                                                                         │
//! │  ┌──────────────┐  ┌──────────────────┐  ┌──────────────────────────┐  │
//! │  │  Database    │  │  FileStorage     │  │  company profile cache   │  │
//! │  │  (SQLite     │  │  (Arc<dyn ..>)   │  │  RwLock<Option<..>>      │  │
//! │  │   pool)      │  │  media + history │  │  loaded at startup,      │  │
//! │  └──────────────┘  └──────────────────┘  │  refreshed on update     │  │
//! │                                          └──────────────────────────┘  │
//! │                                                                         │
//! │  ctx.catalog()  ctx.sales()  ctx.reports()  ctx.search()               │
//! │  ctx.company()  ctx.audit()     ← cheap borrowed service handles       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The pool is internally synchronised; the profile cache is the only
//! piece of mutable shared state.

use std::sync::Arc;

use chrono::FixedOffset;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::error::{ApiError, ApiResult};
use crate::services::{AuditRecorder, CatalogService, CompanyService, ReportService, SalesService, SearchService};
use crate::storage::{FileStorage, LocalFileStorage};
use bodega_core::{CompanyProfile, Session};
use bodega_db::{Database, DbConfig};

/// Shared state of the back-office.
#[derive(Debug)]
pub struct AppContext {
    db: Database,
    storage: Arc<dyn FileStorage>,
    company: RwLock<Option<CompanyProfile>>,
    offset: FixedOffset,
}

impl AppContext {
    /// Wraps an open database and a storage backend, loading the company
    /// profile into the cache.
    pub async fn new(db: Database, storage: Arc<dyn FileStorage>, offset: FixedOffset) -> ApiResult<Self> {
        let company = db.company().get().await?;
        if company.is_none() {
            warn!("Company profile not configured yet");
        }

        Ok(AppContext {
            db,
            storage,
            company: RwLock::new(company),
            offset,
        })
    }

    /// Opens the configured database (running migrations) and media root.
    pub async fn from_config(config: &AppConfig) -> ApiResult<Self> {
        if let Some(parent) = config.database.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ApiError::internal(format!("Could not create database directory: {e}")))?;
        }

        let db = Database::new(
            DbConfig::new(&config.database.path).max_connections(config.database.max_connections),
        )
        .await?;

        let storage = LocalFileStorage::new(&config.media.root, &config.media.base_url);
        info!(root = %storage.root().display(), "Media storage ready");

        Self::new(db, Arc::new(storage), config.utc_offset()).await
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn storage(&self) -> &dyn FileStorage {
        self.storage.as_ref()
    }

    /// Local offset used for date filters and printed dates.
    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Cached company profile, if one was saved.
    pub async fn company_profile(&self) -> Option<CompanyProfile> {
        self.company.read().await.clone()
    }

    pub(crate) async fn set_company_profile(&self, profile: Option<CompanyProfile>) {
        *self.company.write().await = profile;
    }

    /// Resolves the session of an already authenticated username.
    ///
    /// Unknown users get an anonymous session, so every protected operation
    /// answers `Unauthenticated` for them.
    pub async fn session_for(&self, username: &str) -> ApiResult<Session> {
        match self.db.users().load_actor(username).await? {
            Some(actor) => Ok(Session::Authenticated(actor)),
            None => {
                warn!(username = %username, "Unknown user, continuing anonymously");
                Ok(Session::Anonymous)
            }
        }
    }

    // =========================================================================
    // Services
    // =========================================================================

    pub fn catalog(&self) -> CatalogService<'_> {
        CatalogService::new(self)
    }

    pub fn sales(&self) -> SalesService<'_> {
        SalesService::new(self)
    }

    pub fn reports(&self) -> ReportService<'_> {
        ReportService::new(self)
    }

    pub fn search(&self) -> SearchService<'_> {
        SearchService::new(self)
    }

    pub fn company(&self) -> CompanyService<'_> {
        CompanyService::new(self)
    }

    pub fn audit(&self) -> AuditRecorder<'_> {
        AuditRecorder::new(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support;

    #[tokio::test]
    async fn test_session_for_known_and_unknown_users() {
        let ctx = test_support::context().await;
        test_support::admin(&ctx).await;

        let session = ctx.session_for("admin").await.unwrap();
        assert!(session.actor().unwrap().is_superuser);

        let session = ctx.session_for("ghost").await.unwrap();
        assert_eq!(session, Session::Anonymous);
    }

    #[tokio::test]
    async fn test_from_config_creates_database_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.database.path = dir.path().join("data").join("bodega.db");
        config.media.root = dir.path().join("media");

        let ctx = AppContext::from_config(&config).await.unwrap();
        assert!(config.database.path.exists());
        assert!(ctx.company_profile().await.is_none());
        ctx.db().close().await;
    }
}
