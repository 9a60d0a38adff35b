//! # Company Repository
//!
//! The company profile is a singleton: the table only accepts `id = 1`,
//! so "the first row" and "the only row" are the same thing.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::info;

use crate::error::{DbError, DbResult};
use bodega_core::CompanyProfile;

/// Fields written by a profile edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyUpdate {
    pub name: String,
    pub tax_id: Option<String>,
    pub email: Option<String>,
    pub logo: Option<String>,
}

/// Repository for the company profile.
#[derive(Debug, Clone)]
pub struct CompanyRepository {
    pool: SqlitePool,
}

impl CompanyRepository {
    /// Creates a new CompanyRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CompanyRepository { pool }
    }

    /// The profile, if it was ever saved.
    pub async fn get(&self) -> DbResult<Option<CompanyProfile>> {
        let profile = sqlx::query_as::<_, CompanyProfile>(
            "SELECT name, tax_id, email, logo, updated_at FROM company_profile WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(profile)
    }

    /// Creates or replaces the profile.
    pub async fn upsert(&self, update: &CompanyUpdate) -> DbResult<CompanyProfile> {
        sqlx::query(
            r#"
            INSERT INTO company_profile (id, name, tax_id, email, logo, updated_at)
            VALUES (1, ?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                tax_id = excluded.tax_id,
                email = excluded.email,
                logo = excluded.logo,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&update.name)
        .bind(&update.tax_id)
        .bind(&update.email)
        .bind(&update.logo)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        info!(name = %update.name, "Company profile saved");

        self.get()
            .await?
            .ok_or_else(|| DbError::not_found("CompanyProfile", 1))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
