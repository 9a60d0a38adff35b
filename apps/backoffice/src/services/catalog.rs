//! # Catalog Service
//!
//! Categories (brands) and products.
//!
//! ## Product Write Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  update_product(session, id, form)                                      │
//! │                                                                         │
//! │  require_admin ──► validate form ──► load product + categories          │
//! │                     (name, price,        │                               │
//! │                      stock, image ext)   ▼                               │
//! │                                   snapshot BEFORE                        │
//! │                                          │                               │
//! │                         store new image (downscaled, best effort)        │
//! │                                          │                               │
//! │                                   snapshot AFTER                         │
//! │                                          │                               │
//! │                       diff ──► Edited entry, or none when unchanged      │
//! │                                          │                               │
//! │                 UPDATE products + INSERT history (one transaction)       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Reads need a login; every write needs a staff or superuser actor.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ApiResult;
use crate::services::audit::snapshot_of;
use crate::services::{check_image, resolve_image, written_with_image};
use crate::state::AppContext;
use crate::storage::prefix;
use bodega_core::validation::{validate_description, validate_name, validate_price, validate_stock};
use bodega_core::{Category, CategoryForm, CoreError, Product, ProductForm, Session};
use bodega_db::{CategoryUpdate, NewCategory, NewProduct, ProductUpdate};

/// Outcome of a category deletion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryDeletion {
    pub category: Category,
    /// Products removed with it, each with its own `Deleted` entry.
    pub products_removed: u64,
}

/// Validated scalar fields of a product form.
struct ProductFields {
    name: String,
    description: Option<String>,
}

fn validate_product_form(form: &ProductForm) -> ApiResult<ProductFields> {
    let name = validate_name("name", &form.name)?;
    let description = validate_description(form.description.as_deref())?;
    validate_price(form.price)?;
    validate_stock(form.quantity)?;
    check_image(&form.image)?;

    Ok(ProductFields { name, description })
}

/// Catalog operations.
#[derive(Debug, Clone, Copy)]
pub struct CatalogService<'a> {
    ctx: &'a AppContext,
}

impl<'a> CatalogService<'a> {
    pub fn new(ctx: &'a AppContext) -> Self {
        CatalogService { ctx }
    }

    async fn category_or_not_found(&self, id: i64) -> ApiResult<Category> {
        self.ctx
            .db()
            .categories()
            .get(id)
            .await?
            .ok_or_else(|| CoreError::CategoryNotFound(id).into())
    }

    async fn product_or_not_found(&self, id: i64) -> ApiResult<Product> {
        self.ctx
            .db()
            .products()
            .get(id)
            .await?
            .ok_or_else(|| CoreError::ProductNotFound(id).into())
    }

    // =========================================================================
    // Categories
    // =========================================================================

    pub async fn create_category(&self, session: &Session, form: CategoryForm) -> ApiResult<Category> {
        let actor = session.require_admin("create categories")?;
        let name = validate_name("name", &form.name)?;
        check_image(&form.image)?;

        let image = resolve_image(self.ctx, None, &form.image, prefix::CATEGORIES).await?;
        let written = self
            .ctx
            .db()
            .categories()
            .insert(&NewCategory {
                name,
                image: image.clone(),
                actor: Some(actor.user_id),
            })
            .await;
        let category = written_with_image(self.ctx, &form.image, image.as_deref(), written).await?;

        info!(id = category.id, name = %category.name, user = %actor.username, "Category created");
        Ok(category)
    }

    pub async fn update_category(&self, session: &Session, id: i64, form: CategoryForm) -> ApiResult<Category> {
        let actor = session.require_admin("edit categories")?;
        let name = validate_name("name", &form.name)?;
        check_image(&form.image)?;

        let current = self.category_or_not_found(id).await?;
        let image = resolve_image(self.ctx, current.image.as_deref(), &form.image, prefix::CATEGORIES).await?;

        let written = self
            .ctx
            .db()
            .categories()
            .update(
                id,
                &CategoryUpdate {
                    name,
                    image: image.clone(),
                    actor: Some(actor.user_id),
                },
            )
            .await;
        let category = written_with_image(self.ctx, &form.image, image.as_deref(), written).await?;

        info!(id, user = %actor.username, "Category updated");
        Ok(category)
    }

    /// Deletes a category and, through the schema cascade, its products.
    /// Every removed product gets its own `Deleted` history entry.
    pub async fn delete_category(&self, session: &Session, id: i64) -> ApiResult<CategoryDeletion> {
        let actor = session.require_admin("delete categories")?;
        let category = self.category_or_not_found(id).await?;

        let products = self.ctx.db().products().list_by_category(id).await?;
        let mut entries = Vec::with_capacity(products.len());
        for product in &products {
            entries.push(self.ctx.audit().prepare_deletion(product).await);
        }

        let products_removed = self.ctx.db().categories().delete_recording(id, &entries).await?;

        info!(id, products_removed, user = %actor.username, "Category deleted");
        Ok(CategoryDeletion {
            category,
            products_removed,
        })
    }

    pub async fn get_category(&self, session: &Session, id: i64) -> ApiResult<Category> {
        session.require_login()?;
        self.category_or_not_found(id).await
    }

    /// Categories by name.
    pub async fn list_categories(&self, session: &Session) -> ApiResult<Vec<Category>> {
        session.require_login()?;
        Ok(self.ctx.db().categories().list().await?)
    }

    /// Products of one category, by name.
    pub async fn category_products(&self, session: &Session, id: i64) -> ApiResult<Vec<Product>> {
        session.require_login()?;
        self.category_or_not_found(id).await?;
        Ok(self.ctx.db().products().list_by_category(id).await?)
    }

    // =========================================================================
    // Products
    // =========================================================================

    pub async fn create_product(&self, session: &Session, form: ProductForm) -> ApiResult<Product> {
        let actor = session.require_admin("create products")?;
        let fields = validate_product_form(&form)?;
        self.category_or_not_found(form.category_id).await?;

        let image = resolve_image(self.ctx, None, &form.image, prefix::PRODUCTS).await?;
        let entry = self
            .ctx
            .audit()
            .record_creation(&fields.name, image.clone(), Some(actor.user_id));

        let written = self
            .ctx
            .db()
            .products()
            .insert_recording(
                &NewProduct {
                    name: fields.name,
                    description: fields.description,
                    price_cents: form.price.cents(),
                    quantity: form.quantity,
                    image: image.clone(),
                    category_id: form.category_id,
                    actor: Some(actor.user_id),
                },
                entry,
            )
            .await;
        let product = written_with_image(self.ctx, &form.image, image.as_deref(), written).await?;

        info!(id = product.id, user = %actor.username, "Product created");
        Ok(product)
    }

    pub async fn update_product(&self, session: &Session, id: i64, form: ProductForm) -> ApiResult<Product> {
        let actor = session.require_admin("edit products")?;
        let fields = validate_product_form(&form)?;

        let current = self.product_or_not_found(id).await?;
        let old_category = self.category_or_not_found(current.category_id).await?;
        let new_category = if form.category_id == current.category_id {
            old_category.clone()
        } else {
            self.category_or_not_found(form.category_id).await?
        };

        let image = resolve_image(self.ctx, current.image.as_deref(), &form.image, prefix::PRODUCTS).await?;
        let update = ProductUpdate {
            name: fields.name,
            description: fields.description,
            price_cents: form.price.cents(),
            quantity: form.quantity,
            image,
            category_id: form.category_id,
            actor: Some(actor.user_id),
        };

        let before = snapshot_of(&current, &old_category.name);
        let after = snapshot_of(
            &Product {
                name: update.name.clone(),
                description: update.description.clone(),
                price_cents: update.price_cents,
                quantity: update.quantity,
                image: update.image.clone(),
                category_id: update.category_id,
                ..current.clone()
            },
            &new_category.name,
        );
        let entry = self.ctx.audit().record_edit(id, &before, &after, Some(actor.user_id));

        let written = self
            .ctx
            .db()
            .products()
            .update_recording(id, &update, entry.as_ref())
            .await;
        let product = written_with_image(self.ctx, &form.image, update.image.as_deref(), written).await?;

        info!(id, changed = entry.is_some(), user = %actor.username, "Product updated");
        Ok(product)
    }

    /// Deletes a product after recording its `Deleted` entry. Sale lines
    /// and earlier history keep the product's name.
    pub async fn delete_product(&self, session: &Session, id: i64) -> ApiResult<()> {
        let actor = session.require_admin("delete products")?;
        let product = self.product_or_not_found(id).await?;

        let entry = self.ctx.audit().prepare_deletion(&product).await;
        self.ctx.db().products().delete_recording(id, &entry).await?;

        info!(id, name = %product.name, user = %actor.username, "Product deleted");
        Ok(())
    }

    pub async fn get_product(&self, session: &Session, id: i64) -> ApiResult<Product> {
        session.require_login()?;
        self.product_or_not_found(id).await
    }

    /// Products by name.
    pub async fn list_products(&self, session: &Session) -> ApiResult<Vec<Product>> {
        session.require_login()?;
        Ok(self.ctx.db().products().list().await?)
    }
}
