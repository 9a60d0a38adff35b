//! # History Repository
//!
//! Append-only product audit trail. Entries are only ever inserted; the
//! product reference is nulled by the schema when the product goes away,
//! while the denormalized name keeps the entry readable.
//!
//! Entries that accompany a catalog write are inserted inside the same
//! transaction as the write (see `ProductRepository::*_recording`), through
//! [`insert_entry`].

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::contains_pattern;
use bodega_core::audit::FieldChange;
use bodega_core::{ChangeKind, HistoryEntry};

/// A history entry about to be written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewHistoryEntry {
    /// Filled in by the recording write when the product is being created.
    pub product_id: Option<i64>,
    pub product_name: String,
    pub user_id: Option<i64>,
    pub kind: ChangeKind,
    pub detail: String,
    /// Structured edit changes; stored as JSON when non-empty.
    pub changes: Vec<FieldChange>,
    pub image: Option<String>,
}

const HISTORY_COLUMNS: &str =
    "id, product_id, product_name, user_id, kind, detail, changes, image, created_at";

/// Inserts an entry on an existing connection or transaction.
pub(crate) async fn insert_entry(conn: &mut SqliteConnection, entry: &NewHistoryEntry) -> DbResult<i64> {
    debug!(
        product_id = ?entry.product_id,
        kind = %entry.kind,
        "Recording history entry"
    );

    let changes = if entry.changes.is_empty() {
        None
    } else {
        Some(serde_json::to_string(&entry.changes)?)
    };

    let result = sqlx::query(
        r#"
        INSERT INTO history_entries (
            product_id, product_name, user_id, kind, detail, changes, image, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(entry.product_id)
    .bind(&entry.product_name)
    .bind(entry.user_id)
    .bind(entry.kind)
    .bind(&entry.detail)
    .bind(changes)
    .bind(&entry.image)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Repository for the product history.
#[derive(Debug, Clone)]
pub struct HistoryRepository {
    pool: SqlitePool,
}

impl HistoryRepository {
    /// Creates a new HistoryRepository.
    pub fn new(pool: SqlitePool) -> Self {
        HistoryRepository { pool }
    }

    /// Appends an entry outside any catalog write.
    pub async fn insert(&self, entry: &NewHistoryEntry) -> DbResult<HistoryEntry> {
        let mut conn = self.pool.acquire().await?;
        let id = insert_entry(&mut conn, entry).await?;
        drop(conn);

        self.get(id)
            .await?
            .ok_or_else(|| DbError::not_found("HistoryEntry", id))
    }

    /// Gets an entry by ID.
    pub async fn get(&self, id: i64) -> DbResult<Option<HistoryEntry>> {
        let entry = sqlx::query_as::<_, HistoryEntry>(&format!(
            "SELECT {HISTORY_COLUMNS} FROM history_entries WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(entry)
    }

    /// Every entry, newest first.
    pub async fn list(&self) -> DbResult<Vec<HistoryEntry>> {
        let entries = sqlx::query_as::<_, HistoryEntry>(&format!(
            "SELECT {HISTORY_COLUMNS} FROM history_entries ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// Entries whose product name contains `query` (case-insensitive), newest first.
    pub async fn search(&self, query: &str) -> DbResult<Vec<HistoryEntry>> {
        debug!(query = %query, "Searching history");

        let entries = sqlx::query_as::<_, HistoryEntry>(&format!(
            "SELECT {HISTORY_COLUMNS} FROM history_entries \
             WHERE product_name LIKE ?1 ESCAPE '\\' \
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(contains_pattern(query))
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// Distinct product names in the trail (suggestion universe).
    pub async fn all_product_names(&self) -> DbResult<Vec<String>> {
        let names: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT product_name FROM history_entries ORDER BY product_name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(names)
    }

    /// Entries of one product, oldest first.
    pub async fn for_product(&self, product_id: i64) -> DbResult<Vec<HistoryEntry>> {
        let entries = sqlx::query_as::<_, HistoryEntry>(&format!(
            "SELECT {HISTORY_COLUMNS} FROM history_entries \
             WHERE product_id = ?1 ORDER BY created_at, id"
        ))
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
