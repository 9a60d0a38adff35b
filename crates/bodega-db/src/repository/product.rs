//! # Product Repository
//!
//! Database operations for products.
//!
//! ## Key Operations
//! - Search over name, description, category name and price
//! - Audited writes: every catalog write and its history entry commit
//!   together or not at all
//!
//! ## Audited Writes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  insert_recording(product, entry)                                       │
//! │    BEGIN                                                                │
//! │      INSERT products            → id                                   │
//! │      INSERT history_entries     (product_id = id)                      │
//! │    COMMIT                                                               │
//! │                                                                         │
//! │  update_recording(id, update, Some(entry) | None)                       │
//! │    BEGIN  UPDATE products; INSERT history_entries?  COMMIT              │
//! │                                                                         │
//! │  delete_recording(id, entry)                                            │
//! │    BEGIN  INSERT history_entries; DELETE products  COMMIT               │
//! │           (schema nulls history/sale-line references)                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Stock is only moved by the sale ledger (see `SaleRepository`) or by an
//! explicit quantity edit here.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::repository::contains_pattern;
use crate::repository::history::{insert_entry, NewHistoryEntry};
use bodega_core::Product;

/// Fields of a new product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub description: Option<String>,
    pub price_cents: i64,
    pub quantity: i64,
    pub image: Option<String>,
    pub category_id: i64,
    /// Acting user, stamped as creator and last updater.
    pub actor: Option<i64>,
}

/// Fields written by a product edit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductUpdate {
    pub name: String,
    pub description: Option<String>,
    pub price_cents: i64,
    pub quantity: i64,
    pub image: Option<String>,
    pub category_id: i64,
    pub actor: Option<i64>,
}

const PRODUCT_COLUMNS: &str = "id, name, description, price_cents, quantity, image, category_id, \
     created_at, updated_at, created_by, updated_by";

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = ProductRepository::new(pool);
///
/// let results = repo.search("mouse").await?;
/// let product = repo.get(42).await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Inserts a product without a history entry (fixtures, imports).
    pub async fn insert(&self, product: &NewProduct) -> DbResult<Product> {
        let mut conn = self.pool.acquire().await?;
        let id = insert_product(&mut conn, product).await?;
        drop(conn);

        self.fetch(id).await
    }

    /// Inserts a product and its `Created` history entry atomically.
    ///
    /// The entry's `product_id` is set to the new product's id.
    pub async fn insert_recording(&self, product: &NewProduct, mut entry: NewHistoryEntry) -> DbResult<Product> {
        let mut tx = self.pool.begin().await?;

        let id = insert_product(&mut tx, product).await?;
        entry.product_id = Some(id);
        insert_entry(&mut tx, &entry).await?;

        tx.commit().await?;

        info!(id, name = %product.name, "Product created");
        self.fetch(id).await
    }

    /// Applies an edit and, when given, its `Edited` history entry.
    pub async fn update_recording(
        &self,
        id: i64,
        update: &ProductUpdate,
        entry: Option<&NewHistoryEntry>,
    ) -> DbResult<Product> {
        debug!(id, name = %update.name, "Updating product");

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE products SET
                name = ?2,
                description = ?3,
                price_cents = ?4,
                quantity = ?5,
                image = ?6,
                category_id = ?7,
                updated_at = ?8,
                updated_by = ?9
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(&update.name)
        .bind(&update.description)
        .bind(update.price_cents)
        .bind(update.quantity)
        .bind(&update.image)
        .bind(update.category_id)
        .bind(Utc::now())
        .bind(update.actor)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(DbError::not_found("Product", id));
        }

        if let Some(entry) = entry {
            insert_entry(&mut tx, entry).await?;
        }

        tx.commit().await?;

        self.fetch(id).await
    }

    /// Records the `Deleted` entry, then deletes the product.
    ///
    /// Sale lines and earlier history entries keep their rows; the schema
    /// nulls their product reference.
    pub async fn delete_recording(&self, id: i64, entry: &NewHistoryEntry) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        insert_entry(&mut tx, entry).await?;

        let result = sqlx::query("DELETE FROM products WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(DbError::not_found("Product", id));
        }

        tx.commit().await?;

        info!(id, "Product deleted");
        Ok(())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Gets a product by ID.
    pub async fn get(&self, id: i64) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    async fn fetch(&self, id: i64) -> DbResult<Product> {
        self.get(id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id))
    }

    /// Every product, by name.
    pub async fn list(&self) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products ORDER BY name, id"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Products of one category, by name.
    pub async fn list_by_category(&self, category_id: i64) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE category_id = ?1 ORDER BY name, id"
        ))
        .bind(category_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Case-insensitive substring search.
    ///
    /// ## Matched Fields
    /// - product name
    /// - description
    /// - category name
    /// - price written as `1234.50`
    pub async fn search(&self, query: &str) -> DbResult<Vec<Product>> {
        debug!(query = %query, "Searching products");

        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT
                p.id, p.name, p.description, p.price_cents, p.quantity, p.image,
                p.category_id, p.created_at, p.updated_at, p.created_by, p.updated_by
            FROM products p
            INNER JOIN categories c ON c.id = p.category_id
            WHERE p.name LIKE ?1 ESCAPE '\'
               OR p.description LIKE ?1 ESCAPE '\'
               OR c.name LIKE ?1 ESCAPE '\'
               OR printf('%d.%02d', p.price_cents / 100, p.price_cents % 100) LIKE ?1 ESCAPE '\'
            ORDER BY p.name, p.id
            "#,
        )
        .bind(contains_pattern(query))
        .fetch_all(&self.pool)
        .await?;

        debug!(count = products.len(), "Search returned products");
        Ok(products)
    }

    /// Every product name (suggestion universe).
    pub async fn all_names(&self) -> DbResult<Vec<String>> {
        let names: Vec<String> = sqlx::query_scalar("SELECT name FROM products ORDER BY name")
            .fetch_all(&self.pool)
            .await?;

        Ok(names)
    }

    /// Counts products.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

async fn insert_product(conn: &mut SqliteConnection, product: &NewProduct) -> DbResult<i64> {
    debug!(name = %product.name, category_id = product.category_id, "Inserting product");

    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO products (
            name, description, price_cents, quantity, image, category_id,
            created_at, updated_at, created_by, updated_by
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7, ?8, ?8)
        "#,
    )
    .bind(&product.name)
    .bind(&product.description)
    .bind(product.price_cents)
    .bind(product.quantity)
    .bind(&product.image)
    .bind(product.category_id)
    .bind(now)
    .bind(product.actor)
    .execute(&mut *conn)
    .await?;

    Ok(result.last_insert_rowid())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{category, database, new_product, product, user};
    use bodega_core::ChangeKind;

    fn history(kind: ChangeKind, name: &str) -> NewHistoryEntry {
        NewHistoryEntry {
            product_id: None,
            product_name: name.to_string(),
            user_id: None,
            kind,
            detail: format!("{kind}: {name}"),
            changes: Vec::new(),
            image: None,
        }
    }

    #[tokio::test]
    async fn test_insert_recording_links_history() {
        let db = database().await;
        let cat = category(&db, "Logitech").await;
        let admin = user(&db, "admin").await;

        let mut form = new_product("Mouse", cat, 2500, 10);
        form.actor = Some(admin.id);
        let created = db
            .products()
            .insert_recording(&form, history(ChangeKind::Created, "Mouse"))
            .await
            .unwrap();

        assert_eq!(created.created_by, Some(admin.id));
        let trail = db.history().for_product(created.id).await.unwrap();
        assert_eq!(trail.len(), 1);
        assert_eq!(trail[0].kind, ChangeKind::Created);
    }

    #[tokio::test]
    async fn test_insert_rejects_unknown_category() {
        let db = database().await;
        let err = db
            .products()
            .insert_recording(&new_product("Mouse", 77, 100, 1), history(ChangeKind::Created, "Mouse"))
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::ForeignKeyViolation { .. }));
        assert!(db.history().list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_recording() {
        let db = database().await;
        let cat = category(&db, "Logitech").await;
        let id = product(&db, "Mouse", cat, 2500, 10).await;

        let update = ProductUpdate {
            name: "USB Mouse".to_string(),
            description: Some("Wired".to_string()),
            price_cents: 2750,
            quantity: 15,
            image: None,
            category_id: cat,
            actor: None,
        };
        let mut entry = history(ChangeKind::Edited, "USB Mouse");
        entry.product_id = Some(id);

        let updated = db.products().update_recording(id, &update, Some(&entry)).await.unwrap();
        assert_eq!(updated.quantity, 15);
        assert_eq!(updated.price_cents, 2750);
        assert_eq!(db.history().for_product(id).await.unwrap().len(), 1);

        db.products().update_recording(id, &update, None).await.unwrap();
        assert_eq!(db.history().for_product(id).await.unwrap().len(), 1);

        assert!(db
            .products()
            .update_recording(999, &update, None)
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[tokio::test]
    async fn test_negative_stock_is_rejected_by_schema() {
        let db = database().await;
        let cat = category(&db, "Logitech").await;
        let err = db.products().insert(&new_product("Mouse", cat, 100, -1)).await.unwrap_err();
        assert!(matches!(err, DbError::QueryFailed(_)));
    }

    #[tokio::test]
    async fn test_delete_recording_keeps_trail() {
        let db = database().await;
        let cat = category(&db, "Logitech").await;
        let id = product(&db, "Mouse", cat, 2500, 10).await;

        let mut entry = history(ChangeKind::Deleted, "Mouse");
        entry.product_id = Some(id);
        db.products().delete_recording(id, &entry).await.unwrap();

        assert!(db.products().get(id).await.unwrap().is_none());
        let trail = db.history().list().await.unwrap();
        assert_eq!(trail.len(), 1);
        assert_eq!(trail[0].product_id, None);
        assert_eq!(trail[0].product_name, "Mouse");

        assert!(db
            .products()
            .delete_recording(id, &entry)
            .await
            .unwrap_err()
            .is_not_found());
        assert_eq!(db.history().list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_search_fields() {
        let db = database().await;
        let logi = category(&db, "Logitech").await;
        let dell = category(&db, "Dell").await;
        product(&db, "Mouse", logi, 2550, 1).await;
        product(&db, "Laptop", dell, 350000, 1).await;

        let names = |ps: Vec<Product>| ps.into_iter().map(|p| p.name).collect::<Vec<_>>();

        assert_eq!(names(db.products().search("mou").await.unwrap()), vec!["Mouse"]);
        assert_eq!(names(db.products().search("DELL").await.unwrap()), vec!["Laptop"]);
        assert_eq!(names(db.products().search("25.5").await.unwrap()), vec!["Mouse"]);
        assert!(db.products().search("zzz").await.unwrap().is_empty());
        assert_eq!(db.products().list_by_category(dell).await.unwrap().len(), 1);
        assert_eq!(db.products().all_names().await.unwrap(), vec!["Laptop", "Mouse"]);
    }
}
