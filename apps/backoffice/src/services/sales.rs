//! # Sales Service
//!
//! Sale creation and the line operations of the sale detail screen.
//!
//! ## Sale Creation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  create_sale(session, form)                                             │
//! │                                                                         │
//! │  1. login required; the actor becomes the seller                        │
//! │  2. validate EVERYTHING first (nothing is written on failure):          │
//! │       customer name, at least one line, quantity > 0,                   │
//! │       product exists, Σ quantity per product ≤ stock                    │
//! │  3. resolve unit prices (missing or zero → product price)               │
//! │     and bound every subtotal and the total to ten digits                │
//! │  4. SaleRepository::create_with_lines  ── one transaction:              │
//! │       header, guarded stock decrements, lines, total                    │
//! │       (a concurrent sale that took the stock → InsufficientStock,       │
//! │        nothing applied)                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Visibility
//! Superusers see every sale. Everyone else only sees, edits and prints
//! the sales they sold; other sales answer "not found".

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ApiResult;
use crate::services::search::search_outcome;
use crate::state::AppContext;
use bodega_core::search::SearchOutcome;
use bodega_core::validation::{
    add_to_total, check_stock, line_subtotal, validate_name, validate_price, validate_quantity, validate_search_query,
};
use bodega_core::{
    Actor, CoreError, Money, PaymentMethod, Product, Sale, SaleDetail, SaleForm, SaleLine, SaleLineInput, Session,
    User, ValidationError,
};
use bodega_db::{NewSale, NewSaleLine, SaleCriteria, SaleSummary};

/// A sale as shown on its detail screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleView {
    pub detail: SaleDetail,
    pub seller_username: String,
}

/// New figures for an existing line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleLineUpdate {
    pub quantity: i64,
    /// Missing or zero keeps the product's current price.
    pub unit_price: Option<Money>,
}

/// Choices offered by the sales filter form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleFilterOptions {
    pub sellers: Vec<User>,
    pub products: Vec<Product>,
    pub payment_methods: Vec<PaymentMethod>,
}

/// Unit price of a line: the supplied one unless missing or zero.
fn unit_price(supplied: Option<Money>, fallback: Money) -> ApiResult<Money> {
    let price = supplied.filter(|p| !p.is_zero()).unwrap_or(fallback);
    validate_price(price)?;
    Ok(price)
}

/// Sale ledger operations.
#[derive(Debug, Clone, Copy)]
pub struct SalesService<'a> {
    ctx: &'a AppContext,
}

impl<'a> SalesService<'a> {
    pub fn new(ctx: &'a AppContext) -> Self {
        SalesService { ctx }
    }

    async fn product_or_not_found(&self, id: i64) -> ApiResult<Product> {
        self.ctx
            .db()
            .products()
            .get(id)
            .await?
            .ok_or_else(|| CoreError::ProductNotFound(id).into())
    }

    /// The sale, if `actor` may see it.
    pub(crate) async fn visible_sale(&self, actor: &Actor, sale_id: i64) -> ApiResult<SaleSummary> {
        let summary = self
            .ctx
            .db()
            .sales()
            .summary(sale_id)
            .await?
            .ok_or(CoreError::SaleNotFound(sale_id))?;

        match actor.sales_visibility() {
            Some(seller) if seller != summary.sale.seller_id => Err(CoreError::SaleNotFound(sale_id).into()),
            _ => Ok(summary),
        }
    }

    async fn visible_line(&self, actor: &Actor, line_id: i64) -> ApiResult<(SaleLine, SaleSummary)> {
        let line = self
            .ctx
            .db()
            .sales()
            .get_line(line_id)
            .await?
            .ok_or(CoreError::SaleLineNotFound(line_id))?;

        let summary = self
            .visible_sale(actor, line.sale_id)
            .await
            .map_err(|e| if e.is_not_found() { CoreError::SaleLineNotFound(line_id).into() } else { e })?;
        Ok((line, summary))
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Records a sale sold by the session's user.
    pub async fn create_sale(&self, session: &Session, form: SaleForm) -> ApiResult<SaleDetail> {
        let actor = session.require_login()?;
        let customer = validate_name("customer", &form.customer)?;
        if form.lines.is_empty() {
            return Err(ValidationError::required("products").into());
        }

        let mut requested: BTreeMap<i64, (Product, i64)> = BTreeMap::new();
        let mut lines = Vec::with_capacity(form.lines.len());
        let mut total = Money::zero();

        for input in &form.lines {
            validate_quantity(input.quantity)?;
            let product = match requested.get(&input.product_id) {
                Some((product, _)) => product.clone(),
                None => self.product_or_not_found(input.product_id).await?,
            };
            let price = unit_price(input.unit_price, product.price())?;
            total = add_to_total(total, line_subtotal(input.quantity, price)?)?;

            lines.push(NewSaleLine {
                product_id: product.id,
                quantity: input.quantity,
                unit_price_cents: price.cents(),
            });
            requested.entry(product.id).or_insert((product, 0)).1 += input.quantity;
        }

        for (product, total) in requested.values() {
            check_stock(&product.name, *total, product.quantity)?;
        }

        let detail = self
            .ctx
            .db()
            .sales()
            .create_with_lines(
                &NewSale {
                    customer,
                    seller_id: actor.user_id,
                    payment_method: form.payment_method,
                    actor: Some(actor.user_id),
                },
                &lines,
            )
            .await?;

        info!(
            sale_id = detail.sale.id,
            seller = %actor.username,
            lines = detail.lines.len(),
            total = %detail.sale.total(),
            "Sale recorded"
        );
        Ok(detail)
    }

    /// Adds a product line to a visible sale.
    pub async fn add_line(&self, session: &Session, sale_id: i64, input: SaleLineInput) -> ApiResult<SaleLine> {
        let actor = session.require_login()?;
        let summary = self.visible_sale(actor, sale_id).await?;

        let product = self.product_or_not_found(input.product_id).await?;
        check_stock(&product.name, input.quantity, product.quantity)?;
        let price = unit_price(input.unit_price, product.price())?;
        add_to_total(summary.sale.total(), line_subtotal(input.quantity, price)?)?;

        let line = self
            .ctx
            .db()
            .sales()
            .add_line(
                sale_id,
                &NewSaleLine {
                    product_id: product.id,
                    quantity: input.quantity,
                    unit_price_cents: price.cents(),
                },
                Some(actor.user_id),
            )
            .await?;

        info!(sale_id, line_id = line.id, user = %actor.username, "Sale line added");
        Ok(line)
    }

    /// Changes a line's quantity and price; stock follows the difference.
    pub async fn update_line(&self, session: &Session, line_id: i64, update: SaleLineUpdate) -> ApiResult<SaleLine> {
        let actor = session.require_login()?;
        validate_quantity(update.quantity)?;
        let (line, summary) = self.visible_line(actor, line_id).await?;

        let product = match line.product_id {
            Some(id) => self.ctx.db().products().get(id).await?,
            None => None,
        };

        let delta = update.quantity - line.quantity;
        if let Some(product) = &product {
            if delta > 0 {
                check_stock(&product.name, delta, product.quantity)?;
            }
        }

        let fallback = product.as_ref().map(Product::price).unwrap_or_else(|| line.unit_price());
        let price = unit_price(update.unit_price, fallback)?;
        add_to_total(summary.sale.total() - line.subtotal(), line_subtotal(update.quantity, price)?)?;

        let updated = self
            .ctx
            .db()
            .sales()
            .update_line(line_id, update.quantity, price.cents(), Some(actor.user_id))
            .await?;

        info!(line_id, delta, user = %actor.username, "Sale line updated");
        Ok(updated)
    }

    /// Removes a line, giving its quantity back to stock.
    ///
    /// ## Returns
    /// The sale with its recomputed total.
    pub async fn delete_line(&self, session: &Session, line_id: i64) -> ApiResult<Sale> {
        let actor = session.require_login()?;
        self.visible_line(actor, line_id).await?;

        let sale = self.ctx.db().sales().delete_line(line_id, Some(actor.user_id)).await?;

        info!(line_id, sale_id = sale.id, user = %actor.username, "Sale line deleted");
        Ok(sale)
    }

    /// Deletes a sale, giving every line's quantity back to stock.
    pub async fn delete_sale(&self, session: &Session, sale_id: i64) -> ApiResult<()> {
        let actor = session.require_login()?;
        self.visible_sale(actor, sale_id).await?;

        self.ctx.db().sales().delete_sale(sale_id).await?;

        info!(sale_id, user = %actor.username, "Sale deleted");
        Ok(())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub async fn get_sale(&self, session: &Session, sale_id: i64) -> ApiResult<SaleView> {
        let actor = session.require_login()?;
        let summary = self.visible_sale(actor, sale_id).await?;
        let lines = self.ctx.db().sales().lines(sale_id).await?;

        Ok(SaleView {
            detail: SaleDetail {
                sale: summary.sale,
                lines,
            },
            seller_username: summary.seller_username,
        })
    }

    /// Visible sales, newest first, optionally filtered by customer.
    /// An empty result suggests customer names of the visible sales.
    pub async fn list_sales(
        &self,
        session: &Session,
        query: &str,
        from_suggestion: bool,
    ) -> ApiResult<SearchOutcome<SaleSummary>> {
        let actor = session.require_login()?;
        let query = validate_search_query(query)?;
        let visibility = actor.sales_visibility();

        let sales = self.ctx.db().sales();
        let criteria = SaleCriteria::default().visible_to(visibility).customer(query.clone());
        let results = sales.list(&criteria).await?;

        search_outcome(query, results, from_suggestion, || sales.all_customers(visibility)).await
    }

    /// Sellers, products and payment methods for the filter form.
    pub async fn filter_options(&self, session: &Session) -> ApiResult<SaleFilterOptions> {
        session.require_login()?;

        Ok(SaleFilterOptions {
            sellers: self.ctx.db().users().sellers().await?,
            products: self.ctx.db().products().list().await?,
            payment_methods: PaymentMethod::ALL.to_vec(),
        })
    }
}
