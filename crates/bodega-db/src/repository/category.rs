//! # Category Repository
//!
//! Database operations for categories (brands).
//!
//! ## Cascade
//! ```text
//! DELETE category ──► products of the category (ON DELETE CASCADE)
//!                          ├── sale_lines.product_id      → NULL
//!                          └── history_entries.product_id → NULL
//! ```
//! The schema deletes the products; the caller supplies one `Deleted`
//! history entry per product so the trail records each of them.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::repository::contains_pattern;
use crate::repository::history::{insert_entry, NewHistoryEntry};
use bodega_core::Category;

/// Fields of a new category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCategory {
    pub name: String,
    pub image: Option<String>,
    /// Acting user, stamped as creator and last updater.
    pub actor: Option<i64>,
}

/// Fields written by a category edit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryUpdate {
    pub name: String,
    pub image: Option<String>,
    pub actor: Option<i64>,
}

const CATEGORY_COLUMNS: &str = "id, name, image, created_at, updated_at, created_by, updated_by";

/// Repository for category database operations.
#[derive(Debug, Clone)]
pub struct CategoryRepository {
    pool: SqlitePool,
}

impl CategoryRepository {
    /// Creates a new CategoryRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CategoryRepository { pool }
    }

    /// Inserts a category.
    pub async fn insert(&self, category: &NewCategory) -> DbResult<Category> {
        debug!(name = %category.name, "Inserting category");

        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO categories (name, image, created_at, updated_at, created_by, updated_by)
            VALUES (?1, ?2, ?3, ?3, ?4, ?4)
            "#,
        )
        .bind(&category.name)
        .bind(&category.image)
        .bind(now)
        .bind(category.actor)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        self.get(id)
            .await?
            .ok_or_else(|| DbError::not_found("Category", id))
    }

    /// Updates name and image; stamps `updated_by` / `updated_at`.
    pub async fn update(&self, id: i64, update: &CategoryUpdate) -> DbResult<Category> {
        debug!(id, name = %update.name, "Updating category");

        let result = sqlx::query(
            r#"
            UPDATE categories SET
                name = ?2,
                image = ?3,
                updated_at = ?4,
                updated_by = ?5
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(&update.name)
        .bind(&update.image)
        .bind(Utc::now())
        .bind(update.actor)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Category", id));
        }

        self.get(id)
            .await?
            .ok_or_else(|| DbError::not_found("Category", id))
    }

    /// Gets a category by ID.
    pub async fn get(&self, id: i64) -> DbResult<Option<Category>> {
        let category = sqlx::query_as::<_, Category>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(category)
    }

    /// Every category, by name.
    pub async fn list(&self) -> DbResult<Vec<Category>> {
        let categories = sqlx::query_as::<_, Category>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories ORDER BY name, id"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(categories)
    }

    /// Categories whose name contains `query` (case-insensitive), by name.
    pub async fn search(&self, query: &str) -> DbResult<Vec<Category>> {
        debug!(query = %query, "Searching categories");

        let categories = sqlx::query_as::<_, Category>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories \
             WHERE name LIKE ?1 ESCAPE '\\' ORDER BY name, id"
        ))
        .bind(contains_pattern(query))
        .fetch_all(&self.pool)
        .await?;

        Ok(categories)
    }

    /// Every category name (suggestion universe).
    pub async fn all_names(&self) -> DbResult<Vec<String>> {
        let names: Vec<String> = sqlx::query_scalar("SELECT name FROM categories ORDER BY name")
            .fetch_all(&self.pool)
            .await?;

        Ok(names)
    }

    /// Deletes a category together with its products, recording `history`
    /// in the same transaction.
    ///
    /// ## Returns
    /// The number of products removed by the cascade.
    pub async fn delete_recording(&self, id: i64, history: &[NewHistoryEntry]) -> DbResult<u64> {
        let mut tx = self.pool.begin().await?;

        let products: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE category_id = ?1")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

        for entry in history {
            insert_entry(&mut tx, entry).await?;
        }

        let result = sqlx::query("DELETE FROM categories WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(DbError::not_found("Category", id));
        }

        tx.commit().await?;

        info!(id, products, "Category deleted");
        Ok(products as u64)
    }

    /// Counts categories.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM categories")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{category, database, product, user};
    use bodega_core::ChangeKind;

    #[tokio::test]
    async fn test_insert_stamps_creator_and_updater() {
        let db = database().await;
        let admin = user(&db, "admin").await;

        let created = db
            .categories()
            .insert(&NewCategory {
                name: "Logitech".to_string(),
                image: None,
                actor: Some(admin.id),
            })
            .await
            .unwrap();

        assert_eq!(created.created_by, Some(admin.id));
        assert_eq!(created.updated_by, Some(admin.id));
        assert_eq!(created.created_at, created.updated_at);
    }

    #[tokio::test]
    async fn test_update_and_missing() {
        let db = database().await;
        let editor = user(&db, "editor").await;
        let id = category(&db, "Logi").await;

        let updated = db
            .categories()
            .update(
                id,
                &CategoryUpdate {
                    name: "Logitech".to_string(),
                    image: Some("categories/logo.png".to_string()),
                    actor: Some(editor.id),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Logitech");
        assert_eq!(updated.updated_by, Some(editor.id));
        assert_eq!(updated.created_by, None);

        let err = db
            .categories()
            .update(
                999,
                &CategoryUpdate {
                    name: "x".to_string(),
                    image: None,
                    actor: None,
                },
            )
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_search_is_case_insensitive() {
        let db = database().await;
        category(&db, "Logitech").await;
        category(&db, "Dell").await;

        let found = db.categories().search("logi").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Logitech");
        assert_eq!(db.categories().all_names().await.unwrap(), vec!["Dell", "Logitech"]);
    }

    #[tokio::test]
    async fn test_delete_cascades_products_and_records_history() {
        let db = database().await;
        let id = category(&db, "Logitech").await;
        let mouse = product(&db, "Mouse", id, 2500, 3).await;
        product(&db, "Keyboard", id, 9000, 1).await;

        let history: Vec<NewHistoryEntry> = ["Mouse", "Keyboard"]
            .iter()
            .map(|name| NewHistoryEntry {
                product_id: Some(mouse),
                product_name: name.to_string(),
                user_id: None,
                kind: ChangeKind::Deleted,
                detail: format!("{name} removed"),
                changes: Vec::new(),
                image: None,
            })
            .collect();

        let removed = db.categories().delete_recording(id, &history).await.unwrap();
        assert_eq!(removed, 2);
        assert_eq!(db.products().count().await.unwrap(), 0);

        let trail = db.history().list().await.unwrap();
        assert_eq!(trail.len(), 2);
        assert!(trail.iter().all(|e| e.product_id.is_none()));
    }

    #[tokio::test]
    async fn test_delete_missing_category_records_nothing() {
        let db = database().await;
        let history = vec![NewHistoryEntry {
            product_id: None,
            product_name: "Ghost".to_string(),
            user_id: None,
            kind: ChangeKind::Deleted,
            detail: "gone".to_string(),
            changes: Vec::new(),
            image: None,
        }];

        let err = db.categories().delete_recording(42, &history).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(db.history().list().await.unwrap().is_empty());
    }
}
