//! # Service Layer
//!
//! Business operations of the back-office. Every operation takes the
//! caller's [`Session`](bodega_core::Session) and runs its steps in an
//! order the caller can see:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Anatomy of a Service Operation                      │
//! │                                                                         │
//! │  1. permission     session.require_admin("edit products")?             │
//! │  2. validation     whole form, before anything is written              │
//! │  3. media          store the (downscaled) upload, best effort resize   │
//! │  4. persistence    one repository call = one transaction               │
//! │                    (catalog write + history entry, or sale + stock)    │
//! │  5. log            info!(..) with the ids involved                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Services are borrowed views over [`AppContext`]; create them with
//! `ctx.catalog()`, `ctx.sales()` and friends.

mod audit;
mod catalog;
mod company;
mod reports;
mod sales;
mod search;

pub use audit::{snapshot_of, AuditRecorder};
pub use catalog::{CatalogService, CategoryDeletion};
pub use company::CompanyService;
pub use reports::ReportService;
pub use sales::{SaleFilterOptions, SaleLineUpdate, SaleView, SalesService};
pub use search::SearchService;

use tracing::{debug, warn};

use crate::error::{ApiError, ApiResult};
use crate::imaging;
use crate::state::AppContext;
use bodega_core::validation::validate_image_upload;
use bodega_core::{ImageChange, ImageUpload};

/// Validates the upload of an image field, if it carries one.
pub(crate) fn check_image(change: &ImageChange) -> ApiResult<()> {
    if let Some(upload) = change.upload() {
        validate_image_upload(upload)?;
    }
    Ok(())
}

/// Downscales (best effort) and stores an upload under `prefix`.
pub(crate) async fn store_upload(ctx: &AppContext, prefix: &str, upload: &ImageUpload) -> ApiResult<String> {
    let extension = validate_image_upload(upload)?;
    let bytes = imaging::best_effort(upload.bytes.clone(), &extension).await;

    let key = ctx.storage().save(prefix, &upload.file_name, &bytes).await?;
    debug!(key = %key, original_len = upload.bytes.len(), stored_len = bytes.len(), "Upload stored");
    Ok(key)
}

/// The image reference a record ends up with after an edit.
///
/// Replaced files are left in storage: history entries may still point
/// at them.
pub(crate) async fn resolve_image(
    ctx: &AppContext,
    current: Option<&str>,
    change: &ImageChange,
    prefix: &str,
) -> ApiResult<Option<String>> {
    match change {
        ImageChange::Keep => Ok(current.map(str::to_string)),
        ImageChange::Clear => Ok(None),
        ImageChange::Replace(upload) => store_upload(ctx, prefix, upload).await.map(Some),
    }
}

/// Finishes a write whose record references `image`. If the write failed
/// and `image` was stored by this request, the file is removed again.
pub(crate) async fn written_with_image<T, E>(
    ctx: &AppContext,
    change: &ImageChange,
    image: Option<&str>,
    written: Result<T, E>,
) -> ApiResult<T>
where
    E: Into<ApiError>,
{
    let err = match written {
        Ok(value) => return Ok(value),
        Err(err) => err.into(),
    };

    if let (ImageChange::Replace(_), Some(key)) = (change, image) {
        match ctx.storage().delete(key).await {
            Ok(()) => debug!(key, "Upload of a failed write discarded"),
            Err(e) => warn!(key, error = %e, "Could not discard upload of a failed write"),
        }
    }
    Err(err)
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Fixtures shared by the service tests.

    use std::sync::Arc;

    use chrono::{FixedOffset, Offset, Utc};
    use image::ImageFormat;

    use crate::state::AppContext;
    use crate::storage::MemoryFileStorage;
    use bodega_core::access::WORKERS_GROUP;
    use bodega_core::{Category, CategoryForm, ImageChange, ImageUpload, Money, Product, ProductForm, Session};
    use bodega_db::{Database, DbConfig, NewUser};

    pub async fn context() -> AppContext {
        context_with_offset(Utc.fix()).await
    }

    pub async fn context_with_offset(offset: FixedOffset) -> AppContext {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        AppContext::new(db, Arc::new(MemoryFileStorage::new("/media")), offset)
            .await
            .unwrap()
    }

    /// Context plus a handle on its storage, for tests that inspect files.
    pub async fn context_with_storage() -> (AppContext, Arc<MemoryFileStorage>) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let storage = Arc::new(MemoryFileStorage::new("/media"));
        let ctx = AppContext::new(db, storage.clone(), Utc.fix()).await.unwrap();
        (ctx, storage)
    }

    /// Makes every write to `table` fail from now on.
    pub async fn reject_writes(ctx: &AppContext, table: &str) {
        for event in ["INSERT", "UPDATE"] {
            sqlx::query(&format!(
                "CREATE TRIGGER reject_{event}_{table} BEFORE {event} ON {table} \
                 BEGIN SELECT RAISE(ABORT, 'writes rejected'); END"
            ))
            .execute(ctx.db().pool())
            .await
            .unwrap();
        }
    }

    pub async fn user(ctx: &AppContext, username: &str, is_staff: bool, is_superuser: bool) -> Session {
        ctx.db()
            .users()
            .insert(&NewUser {
                username: username.to_string(),
                is_staff,
                is_superuser,
            })
            .await
            .unwrap();
        ctx.session_for(username).await.unwrap()
    }

    /// Staff superuser called `admin`.
    pub async fn admin(ctx: &AppContext) -> Session {
        user(ctx, "admin", true, true).await
    }

    /// Plain member of the workers group.
    pub async fn worker(ctx: &AppContext, username: &str) -> Session {
        let session = user(ctx, username, false, false).await;
        let id = session.actor().unwrap().user_id;
        ctx.db().users().add_to_group(id, WORKERS_GROUP).await.unwrap();
        ctx.session_for(username).await.unwrap()
    }

    pub fn png(width: u32, height: u32) -> ImageUpload {
        ImageUpload::new("photo.png", crate::imaging::tests::picture(width, height, ImageFormat::Png))
    }

    pub async fn category(ctx: &AppContext, session: &Session, name: &str) -> Category {
        ctx.catalog()
            .create_category(
                session,
                CategoryForm {
                    name: name.to_string(),
                    image: ImageChange::Keep,
                },
            )
            .await
            .unwrap()
    }

    pub fn product_form(name: &str, category_id: i64, price_cents: i64, quantity: i64) -> ProductForm {
        ProductForm {
            name: name.to_string(),
            description: None,
            price: Money::from_cents(price_cents),
            quantity,
            category_id,
            image: ImageChange::Keep,
        }
    }

    pub async fn product(
        ctx: &AppContext,
        session: &Session,
        name: &str,
        category_id: i64,
        price_cents: i64,
        quantity: i64,
    ) -> Product {
        ctx.catalog()
            .create_product(session, product_form(name, category_id, price_cents, quantity))
            .await
            .unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_support::*;

    #[tokio::test]
    async fn test_resolve_image_keep_clear_replace() {
        let ctx = context().await;

        let kept = resolve_image(&ctx, Some("products/a.png"), &ImageChange::Keep, "products/")
            .await
            .unwrap();
        assert_eq!(kept.as_deref(), Some("products/a.png"));

        let cleared = resolve_image(&ctx, Some("products/a.png"), &ImageChange::Clear, "products/")
            .await
            .unwrap();
        assert!(cleared.is_none());

        let replaced = resolve_image(&ctx, None, &ImageChange::Replace(png(10, 10)), "products/")
            .await
            .unwrap()
            .unwrap();
        assert!(replaced.starts_with("products/"));
        assert!(!ctx.storage().read(&replaced).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_large_upload_is_stored_downscaled() {
        let ctx = context().await;
        let key = store_upload(&ctx, "categories/", &png(1200, 600)).await.unwrap();

        let stored = ctx.storage().read(&key).await.unwrap();
        let img = image::load_from_memory(&stored).unwrap();
        assert_eq!((img.width(), img.height()), (800, 400));
    }

    #[tokio::test]
    async fn test_undecodable_upload_is_kept_as_is() {
        let ctx = context().await;
        let upload = ImageUpload::new("broken.jpg", b"not really a jpeg".to_vec());

        let key = store_upload(&ctx, "products/", &upload).await.unwrap();
        assert_eq!(ctx.storage().read(&key).await.unwrap(), b"not really a jpeg");
    }

    #[test]
    fn test_check_image_rejects_bad_extension() {
        let change = ImageChange::Replace(ImageUpload::new("virus.exe", vec![1, 2, 3]));
        assert!(check_image(&change).is_err());
        assert!(check_image(&ImageChange::Keep).is_ok());
    }
}
