//! # Sale Repository
//!
//! Database operations for sales, sale lines and the stock they move.
//!
//! ## Ledger Operations
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       One transaction each                              │
//! │                                                                         │
//! │  create_with_lines(sale, lines)                                        │
//! │    INSERT sales (total 0)                                              │
//! │    for each line:                                                      │
//! │      UPDATE products SET quantity = quantity - q                       │
//! │        WHERE id = p AND quantity >= q   ── 0 rows → InsufficientStock  │
//! │      INSERT sale_lines (name snapshot, subtotal = q × price)           │
//! │    UPDATE sales SET total = Σ subtotal                                 │
//! │                                                                         │
//! │  add_line     → guarded decrement, insert, recompute                   │
//! │  update_line  → decrement / restore by the quantity delta, recompute   │
//! │  delete_line  → restore q onto the product, delete, recompute          │
//! │  delete_sale  → restore every line, delete (lines cascade)             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The decrement is a single conditional statement, so two sales racing for
//! the last units cannot both succeed: the loser sees zero affected rows
//! and its whole transaction is rolled back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use crate::repository::contains_pattern;
use bodega_core::filter::SaleFilter;
use bodega_core::{PaymentMethod, Sale, SaleDetail, SaleLine};

// =============================================================================
// Inputs
// =============================================================================

/// Header of a new sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSale {
    pub customer: String,
    pub seller_id: i64,
    pub payment_method: PaymentMethod,
    /// Acting user, stamped as creator and last updater.
    pub actor: Option<i64>,
}

/// A resolved line: the unit price is already decided by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSaleLine {
    pub product_id: i64,
    pub quantity: i64,
    pub unit_price_cents: i64,
}

/// Row filter shared by listing, existence checks and reports.
///
/// Date bounds are a half-open UTC interval `[from, until)`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleCriteria {
    pub from: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub seller_id: Option<i64>,
    /// Sales with at least one line of this product.
    pub product_id: Option<i64>,
    pub payment_method: Option<PaymentMethod>,
    /// Case-insensitive substring of the customer name.
    pub customer: Option<String>,
    /// Restricts to sales sold by this user (non-superuser visibility).
    pub visible_to: Option<i64>,
}

impl SaleCriteria {
    /// Criteria of a parsed filter with its dates already converted.
    pub fn from_filter(filter: &SaleFilter, from: Option<DateTime<Utc>>, until: Option<DateTime<Utc>>) -> Self {
        SaleCriteria {
            from,
            until,
            seller_id: filter.seller_id,
            product_id: filter.product_id,
            payment_method: filter.payment_method,
            customer: None,
            visible_to: None,
        }
    }

    pub fn visible_to(mut self, seller: Option<i64>) -> Self {
        self.visible_to = seller;
        self
    }

    pub fn customer(mut self, query: impl Into<String>) -> Self {
        let query = query.into();
        self.customer = if query.trim().is_empty() { None } else { Some(query) };
        self
    }

    /// Appends ` WHERE ...` for every set field.
    fn push_where(&self, query: &mut QueryBuilder<'_, Sqlite>) {
        query.push(" WHERE 1 = 1");

        if let Some(from) = self.from {
            query.push(" AND julianday(s.created_at) >= julianday(").push_bind(from).push(")");
        }
        if let Some(until) = self.until {
            query.push(" AND julianday(s.created_at) < julianday(").push_bind(until).push(")");
        }
        if let Some(seller) = self.seller_id {
            query.push(" AND s.seller_id = ").push_bind(seller);
        }
        if let Some(visible) = self.visible_to {
            query.push(" AND s.seller_id = ").push_bind(visible);
        }
        if let Some(product) = self.product_id {
            query
                .push(" AND EXISTS (SELECT 1 FROM sale_lines l WHERE l.sale_id = s.id AND l.product_id = ")
                .push_bind(product)
                .push(")");
        }
        if let Some(method) = self.payment_method {
            query.push(" AND s.payment_method = ").push_bind(method);
        }
        if let Some(customer) = &self.customer {
            query
                .push(" AND s.customer LIKE ")
                .push_bind(contains_pattern(customer))
                .push(" ESCAPE '\\'");
        }
    }
}

// =============================================================================
// Outputs
// =============================================================================

/// A sale with its seller's username, as listed and reported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleSummary {
    pub sale: Sale,
    pub seller_username: String,
}

#[derive(sqlx::FromRow)]
struct SaleRow {
    id: i64,
    customer: String,
    seller_id: i64,
    payment_method: PaymentMethod,
    total_cents: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    created_by: Option<i64>,
    updated_by: Option<i64>,
    seller_username: String,
}

impl From<SaleRow> for SaleSummary {
    fn from(row: SaleRow) -> Self {
        SaleSummary {
            sale: Sale {
                id: row.id,
                customer: row.customer,
                seller_id: row.seller_id,
                payment_method: row.payment_method,
                total_cents: row.total_cents,
                created_at: row.created_at,
                updated_at: row.updated_at,
                created_by: row.created_by,
                updated_by: row.updated_by,
            },
            seller_username: row.seller_username,
        }
    }
}

const SALE_COLUMNS: &str = "id, customer, seller_id, payment_method, total_cents, \
     created_at, updated_at, created_by, updated_by";

const LINE_COLUMNS: &str = "id, sale_id, product_id, product_name, quantity, \
     unit_price_cents, subtotal_cents, created_at";

const SUMMARY_SELECT: &str = "SELECT s.id, s.customer, s.seller_id, s.payment_method, s.total_cents, \
     s.created_at, s.updated_at, s.created_by, s.updated_by, u.username AS seller_username \
     FROM sales s INNER JOIN users u ON u.id = s.seller_id";

// =============================================================================
// Repository
// =============================================================================

/// Repository for the sale ledger.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    // =========================================================================
    // Ledger Writes
    // =========================================================================

    /// Creates a sale with its lines, moving stock and setting the total.
    ///
    /// ## Errors
    /// - `InsufficientStock` when a decrement finds less stock than requested
    /// - `NotFound` when a product no longer exists
    /// - `ForeignKeyViolation` for an unknown seller
    ///
    /// Nothing is written when any line fails.
    pub async fn create_with_lines(&self, sale: &NewSale, lines: &[NewSaleLine]) -> DbResult<SaleDetail> {
        debug!(
            customer = %sale.customer,
            seller_id = sale.seller_id,
            lines = lines.len(),
            "Creating sale"
        );

        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO sales (
                customer, seller_id, payment_method, total_cents,
                created_at, updated_at, created_by, updated_by
            ) VALUES (?1, ?2, ?3, 0, ?4, ?4, ?5, ?5)
            "#,
        )
        .bind(&sale.customer)
        .bind(sale.seller_id)
        .bind(sale.payment_method)
        .bind(now)
        .bind(sale.actor)
        .execute(&mut *tx)
        .await?;
        let sale_id = result.last_insert_rowid();

        for line in lines {
            let name = take_stock(&mut tx, line.product_id, line.quantity).await?;
            insert_line(&mut tx, sale_id, line, &name).await?;
        }

        let total = recompute_on(&mut tx, sale_id).await?;
        tx.commit().await?;

        info!(sale_id, total_cents = total, "Sale created");
        self.fetch_detail(sale_id).await
    }

    /// Adds a line to an existing sale.
    pub async fn add_line(&self, sale_id: i64, line: &NewSaleLine, actor: Option<i64>) -> DbResult<SaleLine> {
        debug!(sale_id, product_id = line.product_id, quantity = line.quantity, "Adding sale line");

        let mut tx = self.pool.begin().await?;

        let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM sales WHERE id = ?1")
            .bind(sale_id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(DbError::not_found("Sale", sale_id));
        }

        let name = take_stock(&mut tx, line.product_id, line.quantity).await?;
        let line_id = insert_line(&mut tx, sale_id, line, &name).await?;
        recompute_on(&mut tx, sale_id).await?;
        touch_on(&mut tx, sale_id, actor).await?;

        tx.commit().await?;

        self.get_line(line_id)
            .await?
            .ok_or_else(|| DbError::not_found("SaleLine", line_id))
    }

    /// Changes a line's quantity and unit price.
    ///
    /// Stock moves by the quantity delta: a larger quantity takes the
    /// difference (guarded), a smaller one gives it back. Lines whose
    /// product was deleted only change their own figures.
    pub async fn update_line(
        &self,
        line_id: i64,
        quantity: i64,
        unit_price_cents: i64,
        actor: Option<i64>,
    ) -> DbResult<SaleLine> {
        let mut tx = self.pool.begin().await?;

        let line = line_on(&mut tx, line_id).await?;
        let delta = quantity - line.quantity;
        debug!(line_id, delta, "Updating sale line");

        if let Some(product_id) = line.product_id {
            if delta > 0 {
                take_stock(&mut tx, product_id, delta).await?;
            } else if delta < 0 && !restore_stock(&mut tx, product_id, -delta).await? {
                warn!(line_id, product_id, "Product vanished while restoring stock");
            }
        }

        sqlx::query(
            "UPDATE sale_lines SET quantity = ?2, unit_price_cents = ?3, subtotal_cents = ?4 WHERE id = ?1",
        )
        .bind(line_id)
        .bind(quantity)
        .bind(unit_price_cents)
        .bind(subtotal_cents(quantity, unit_price_cents)?)
        .execute(&mut *tx)
        .await?;

        recompute_on(&mut tx, line.sale_id).await?;
        touch_on(&mut tx, line.sale_id, actor).await?;

        tx.commit().await?;

        self.get_line(line_id)
            .await?
            .ok_or_else(|| DbError::not_found("SaleLine", line_id))
    }

    /// Deletes a line, giving its quantity back to the product.
    ///
    /// ## Returns
    /// The parent sale with its recomputed total.
    pub async fn delete_line(&self, line_id: i64, actor: Option<i64>) -> DbResult<Sale> {
        let mut tx = self.pool.begin().await?;

        let line = line_on(&mut tx, line_id).await?;
        restore_line(&mut tx, &line).await?;

        sqlx::query("DELETE FROM sale_lines WHERE id = ?1")
            .bind(line_id)
            .execute(&mut *tx)
            .await?;

        let total = recompute_on(&mut tx, line.sale_id).await?;
        touch_on(&mut tx, line.sale_id, actor).await?;

        tx.commit().await?;

        info!(line_id, sale_id = line.sale_id, total_cents = total, "Sale line deleted");
        self.get(line.sale_id)
            .await?
            .ok_or_else(|| DbError::not_found("Sale", line.sale_id))
    }

    /// Deletes a sale, giving every line's quantity back first.
    pub async fn delete_sale(&self, sale_id: i64) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        let lines = sqlx::query_as::<_, SaleLine>(&format!(
            "SELECT {LINE_COLUMNS} FROM sale_lines WHERE sale_id = ?1 ORDER BY id"
        ))
        .bind(sale_id)
        .fetch_all(&mut *tx)
        .await?;

        for line in &lines {
            restore_line(&mut tx, line).await?;
        }

        let result = sqlx::query("DELETE FROM sales WHERE id = ?1")
            .bind(sale_id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(DbError::not_found("Sale", sale_id));
        }

        tx.commit().await?;

        info!(sale_id, lines = lines.len(), "Sale deleted");
        Ok(())
    }

    /// Sets the sale total to the sum of its lines. Idempotent.
    pub async fn recompute_total(&self, sale_id: i64) -> DbResult<i64> {
        let mut conn = self.pool.acquire().await?;
        recompute_on(&mut conn, sale_id).await
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Gets a sale by ID.
    pub async fn get(&self, id: i64) -> DbResult<Option<Sale>> {
        let sale = sqlx::query_as::<_, Sale>(&format!("SELECT {SALE_COLUMNS} FROM sales WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(sale)
    }

    /// Gets a sale with its seller's username.
    pub async fn summary(&self, id: i64) -> DbResult<Option<SaleSummary>> {
        let row = sqlx::query_as::<_, SaleRow>(&format!("{SUMMARY_SELECT} WHERE s.id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(SaleSummary::from))
    }

    /// Gets a sale with its lines.
    pub async fn detail(&self, id: i64) -> DbResult<Option<SaleDetail>> {
        let Some(sale) = self.get(id).await? else {
            return Ok(None);
        };
        let lines = self.lines(id).await?;

        Ok(Some(SaleDetail { sale, lines }))
    }

    async fn fetch_detail(&self, id: i64) -> DbResult<SaleDetail> {
        self.detail(id)
            .await?
            .ok_or_else(|| DbError::not_found("Sale", id))
    }

    /// Gets a line by ID.
    pub async fn get_line(&self, id: i64) -> DbResult<Option<SaleLine>> {
        let line = sqlx::query_as::<_, SaleLine>(&format!(
            "SELECT {LINE_COLUMNS} FROM sale_lines WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(line)
    }

    /// Lines of a sale in insertion order.
    pub async fn lines(&self, sale_id: i64) -> DbResult<Vec<SaleLine>> {
        let lines = sqlx::query_as::<_, SaleLine>(&format!(
            "SELECT {LINE_COLUMNS} FROM sale_lines WHERE sale_id = ?1 ORDER BY id"
        ))
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(lines)
    }

    /// Lines of several sales, grouped by sale id.
    pub async fn lines_for_sales(&self, sale_ids: &[i64]) -> DbResult<HashMap<i64, Vec<SaleLine>>> {
        let mut grouped: HashMap<i64, Vec<SaleLine>> = HashMap::new();
        if sale_ids.is_empty() {
            return Ok(grouped);
        }

        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {LINE_COLUMNS} FROM sale_lines WHERE sale_id IN ("));
        let mut separated = query.separated(", ");
        for id in sale_ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(") ORDER BY sale_id, id");

        let lines: Vec<SaleLine> = query.build_query_as().fetch_all(&self.pool).await?;
        for line in lines {
            grouped.entry(line.sale_id).or_default().push(line);
        }

        Ok(grouped)
    }

    /// Matching sales, newest first.
    pub async fn list(&self, criteria: &SaleCriteria) -> DbResult<Vec<SaleSummary>> {
        debug!(?criteria, "Listing sales");
        self.summaries(criteria, " ORDER BY s.created_at DESC, s.id DESC").await
    }

    /// Matching sales in chronological order, for the sales report.
    pub async fn report_rows(&self, criteria: &SaleCriteria) -> DbResult<Vec<SaleSummary>> {
        debug!(?criteria, "Loading report rows");
        self.summaries(criteria, " ORDER BY s.created_at, s.id").await
    }

    async fn summaries(&self, criteria: &SaleCriteria, order: &str) -> DbResult<Vec<SaleSummary>> {
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(SUMMARY_SELECT);
        criteria.push_where(&mut query);
        query.push(order);

        let rows: Vec<SaleRow> = query.build_query_as().fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(SaleSummary::from).collect())
    }

    /// Whether at least one sale matches.
    pub async fn exists(&self, criteria: &SaleCriteria) -> DbResult<bool> {
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT EXISTS (SELECT 1 FROM sales s");
        criteria.push_where(&mut query);
        query.push(")");

        let exists: bool = query.build_query_scalar().fetch_one(&self.pool).await?;
        Ok(exists)
    }

    /// Distinct customer names (suggestion universe), optionally limited to
    /// one seller's sales.
    pub async fn all_customers(&self, visible_to: Option<i64>) -> DbResult<Vec<String>> {
        let customers: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT customer FROM sales WHERE ?1 IS NULL OR seller_id = ?1 ORDER BY customer",
        )
        .bind(visible_to)
        .fetch_all(&self.pool)
        .await?;

        Ok(customers)
    }

    /// Counts sales.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sales")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Transaction Steps
// =============================================================================

/// Guarded decrement. Returns the product name for the line snapshot.
async fn take_stock(conn: &mut SqliteConnection, product_id: i64, quantity: i64) -> DbResult<String> {
    let name: Option<String> = sqlx::query_scalar(
        r#"
        UPDATE products
        SET quantity = quantity - ?2, updated_at = ?3
        WHERE id = ?1 AND quantity >= ?2
        RETURNING name
        "#,
    )
    .bind(product_id)
    .bind(quantity)
    .bind(Utc::now())
    .fetch_optional(&mut *conn)
    .await?;

    if let Some(name) = name {
        return Ok(name);
    }

    let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM products WHERE id = ?1")
        .bind(product_id)
        .fetch_optional(&mut *conn)
        .await?;

    match exists {
        Some(_) => {
            warn!(product_id, requested = quantity, "Stock decrement refused");
            Err(DbError::InsufficientStock {
                product_id,
                requested: quantity,
            })
        }
        None => Err(DbError::not_found("Product", product_id)),
    }
}

/// Additive restore. `false` when the product no longer exists.
async fn restore_stock(conn: &mut SqliteConnection, product_id: i64, quantity: i64) -> DbResult<bool> {
    let result = sqlx::query("UPDATE products SET quantity = quantity + ?2, updated_at = ?3 WHERE id = ?1")
        .bind(product_id)
        .bind(quantity)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected() > 0)
}

async fn restore_line(conn: &mut SqliteConnection, line: &SaleLine) -> DbResult<()> {
    match line.product_id {
        Some(product_id) => {
            if !restore_stock(conn, product_id, line.quantity).await? {
                warn!(line_id = line.id, product_id, "Product vanished while restoring stock");
            }
        }
        None => debug!(line_id = line.id, "Line has no product; nothing to restore"),
    }
    Ok(())
}

fn subtotal_cents(quantity: i64, unit_price_cents: i64) -> DbResult<i64> {
    quantity
        .checked_mul(unit_price_cents)
        .ok_or_else(|| DbError::Internal(format!("subtotal overflows: {quantity} x {unit_price_cents}")))
}

async fn insert_line(conn: &mut SqliteConnection, sale_id: i64, line: &NewSaleLine, name: &str) -> DbResult<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO sale_lines (
            sale_id, product_id, product_name, quantity,
            unit_price_cents, subtotal_cents, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(sale_id)
    .bind(line.product_id)
    .bind(name)
    .bind(line.quantity)
    .bind(line.unit_price_cents)
    .bind(subtotal_cents(line.quantity, line.unit_price_cents)?)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    Ok(result.last_insert_rowid())
}

async fn line_on(conn: &mut SqliteConnection, line_id: i64) -> DbResult<SaleLine> {
    sqlx::query_as::<_, SaleLine>(&format!("SELECT {LINE_COLUMNS} FROM sale_lines WHERE id = ?1"))
        .bind(line_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("SaleLine", line_id))
}

async fn recompute_on(conn: &mut SqliteConnection, sale_id: i64) -> DbResult<i64> {
    let total: Option<i64> = sqlx::query_scalar(
        r#"
        UPDATE sales
        SET total_cents = (
            SELECT COALESCE(SUM(subtotal_cents), 0) FROM sale_lines WHERE sale_id = ?1
        )
        WHERE id = ?1
        RETURNING total_cents
        "#,
    )
    .bind(sale_id)
    .fetch_optional(&mut *conn)
    .await?;

    total.ok_or_else(|| DbError::not_found("Sale", sale_id))
}

async fn touch_on(conn: &mut SqliteConnection, sale_id: i64, actor: Option<i64>) -> DbResult<()> {
    sqlx::query("UPDATE sales SET updated_at = ?2, updated_by = COALESCE(?3, updated_by) WHERE id = ?1")
        .bind(sale_id)
        .bind(Utc::now())
        .bind(actor)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
