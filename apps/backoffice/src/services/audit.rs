//! # Audit Recorder
//!
//! Builds the history entries that accompany catalog writes. The entries
//! are handed to the product repository, which stores them in the same
//! transaction as the write itself.
//!
//! ```text
//! create product ──► record_creation(name, image, actor) ──► Created
//! edit product   ──► record_edit(before, after, ..)      ──► Edited | nothing
//! delete product ──► prepare_deletion(product)           ──► Deleted
//!                        │
//!                        └── image bytes copied to history/ first, so the
//!                            snapshot outlives the product's own file
//! ```

use tracing::{info, warn};

use crate::error::ApiResult;
use crate::services::search::search_outcome;
use crate::state::AppContext;
use crate::storage::prefix;
use bodega_core::audit::{creation_detail, deletion_detail, diff_snapshots, edit_detail, history_name, ProductSnapshot};
use bodega_core::search::SearchOutcome;
use bodega_core::validation::validate_search_query;
use bodega_core::{ChangeKind, HistoryEntry, Product, Session};
use bodega_db::NewHistoryEntry;

/// The tracked fields of a product, with its category's display name.
pub fn snapshot_of(product: &Product, category: &str) -> ProductSnapshot {
    ProductSnapshot {
        name: product.name.clone(),
        description: product.description.clone(),
        price: product.price(),
        quantity: product.quantity,
        category: category.to_string(),
        image: product.image.clone(),
    }
}

/// Records product lifecycle events.
#[derive(Debug, Clone, Copy)]
pub struct AuditRecorder<'a> {
    ctx: &'a AppContext,
}

impl<'a> AuditRecorder<'a> {
    pub fn new(ctx: &'a AppContext) -> Self {
        AuditRecorder { ctx }
    }

    /// Entry for a product about to be created. The repository fills in
    /// the product id.
    pub fn record_creation(&self, name: &str, image: Option<String>, actor: Option<i64>) -> NewHistoryEntry {
        NewHistoryEntry {
            product_id: None,
            product_name: history_name(name),
            user_id: actor,
            kind: ChangeKind::Created,
            detail: creation_detail(name),
            changes: Vec::new(),
            image,
        }
    }

    /// Entry for an edit, or `None` when no tracked field changed.
    pub fn record_edit(
        &self,
        product_id: i64,
        before: &ProductSnapshot,
        after: &ProductSnapshot,
        actor: Option<i64>,
    ) -> Option<NewHistoryEntry> {
        let changes = diff_snapshots(before, after);
        let storage = self.ctx.storage();
        let detail = edit_detail(&changes, &|key: &str| storage.url(key))?;

        Some(NewHistoryEntry {
            product_id: Some(product_id),
            product_name: history_name(&after.name),
            user_id: actor,
            kind: ChangeKind::Edited,
            detail,
            changes,
            image: after.image.clone(),
        })
    }

    /// Entry for a product about to be deleted.
    ///
    /// The image is byte-copied under `history/`; a failed copy is logged
    /// and the entry is recorded without an image. The actor is the
    /// product's last updater.
    pub async fn prepare_deletion(&self, product: &Product) -> NewHistoryEntry {
        let image = match &product.image {
            Some(key) => self.snapshot_image(product.id, key).await,
            None => None,
        };

        NewHistoryEntry {
            product_id: None,
            product_name: history_name(&product.name),
            user_id: product.updated_by,
            kind: ChangeKind::Deleted,
            detail: deletion_detail(&history_name(&product.name)),
            changes: Vec::new(),
            image,
        }
    }

    async fn snapshot_image(&self, product_id: i64, key: &str) -> Option<String> {
        let storage = self.ctx.storage();

        let bytes = match storage.read(key).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(product_id, key = %key, error = %e, "Could not read product image for history");
                return None;
            }
        };

        match storage.save(prefix::HISTORY, key, &bytes).await {
            Ok(copy) => {
                info!(product_id, key = %copy, "Product image copied to history");
                Some(copy)
            }
            Err(e) => {
                warn!(product_id, key = %key, error = %e, "Could not store history image");
                None
            }
        }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// The whole trail, newest first. Admin only.
    pub async fn list(&self, session: &Session) -> ApiResult<Vec<HistoryEntry>> {
        session.require_admin("view the product history")?;
        Ok(self.ctx.db().history().list().await?)
    }

    /// Entries whose product name contains `query`, with suggestions from
    /// the names in the trail when nothing matches. Admin only.
    pub async fn search(&self, session: &Session, query: &str) -> ApiResult<SearchOutcome<HistoryEntry>> {
        session.require_admin("view the product history")?;
        let query = validate_search_query(query)?;
        if query.is_empty() {
            return Ok(SearchOutcome::new(query, self.ctx.db().history().list().await?));
        }

        let history = self.ctx.db().history();
        let results = history.search(&query).await?;
        search_outcome(query, results, false, || history.all_product_names()).await
    }

    /// Entries still linked to a product, oldest first. Admin only.
    pub async fn for_product(&self, session: &Session, product_id: i64) -> ApiResult<Vec<HistoryEntry>> {
        session.require_admin("view the product history")?;
        Ok(self.ctx.db().history().for_product(product_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::*;
    use bodega_core::{ImageChange, Money};

    #[tokio::test]
    async fn test_quantity_edit_records_one_entry() {
        let ctx = context().await;
        let admin = admin(&ctx).await;
        let brand = category(&ctx, &admin, "Logitech").await;
        let mouse = product(&ctx, &admin, "Mouse", brand.id, 1500, 10).await;

        let mut form = product_form("Mouse", brand.id, 1500, 15);
        form.image = ImageChange::Keep;
        ctx.catalog().update_product(&admin, mouse.id, form).await.unwrap();

        let entries = ctx.audit().for_product(&admin, mouse.id).await.unwrap();
        let edits: Vec<_> = entries.iter().filter(|e| e.kind == ChangeKind::Edited).collect();
        assert_eq!(edits.len(), 1);
        assert!(edits[0].detail.contains("increased"));
        assert!(edits[0].detail.contains("10"));
        assert!(edits[0].detail.contains("15"));
        assert_eq!(edits[0].field_changes().len(), 1);
    }

    #[tokio::test]
    async fn test_unchanged_edit_records_nothing() {
        let ctx = context().await;
        let admin = admin(&ctx).await;
        let brand = category(&ctx, &admin, "Logitech").await;
        let mouse = product(&ctx, &admin, "Mouse", brand.id, 1500, 10).await;

        ctx.catalog()
            .update_product(&admin, mouse.id, product_form("  Mouse ", brand.id, 1500, 10))
            .await
            .unwrap();

        let entries = ctx.audit().for_product(&admin, mouse.id).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, ChangeKind::Created);
    }

    #[tokio::test]
    async fn test_several_changes_render_one_line_each() {
        let ctx = context().await;
        let admin = admin(&ctx).await;
        let brand = category(&ctx, &admin, "Logitech").await;
        let other = category(&ctx, &admin, "Razer").await;
        let mouse = product(&ctx, &admin, "Mouse", brand.id, 1500, 10).await;

        let mut form = product_form("Gaming Mouse", other.id, 1500, 4);
        form.price = Money::from_cents(2000);
        form.image = ImageChange::Replace(png(20, 20));
        ctx.catalog().update_product(&admin, mouse.id, form).await.unwrap();

        let entries = ctx.audit().for_product(&admin, mouse.id).await.unwrap();
        let edit = entries.iter().find(|e| e.kind == ChangeKind::Edited).unwrap();
        let lines: Vec<&str> = edit.detail.lines().collect();

        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0], "Name: 'Mouse' → 'Gaming Mouse'");
        assert!(lines[1].starts_with("Price:"));
        assert_eq!(lines[2], "Quantity reduced by 6 (10 → 4)");
        assert_eq!(lines[3], "Category: Logitech → Razer");
        assert!(lines[4].starts_with("Image added: <img src=\"/media/products/"));
        assert_eq!(edit.product_name, "Gaming Mouse");
    }

    #[tokio::test]
    async fn test_deleted_product_keeps_retrievable_image() {
        let ctx = context().await;
        let admin = admin(&ctx).await;
        let brand = category(&ctx, &admin, "Logitech").await;

        let mut form = product_form("Webcam", brand.id, 5000, 2);
        form.image = ImageChange::Replace(png(30, 30));
        let webcam = ctx.catalog().create_product(&admin, form).await.unwrap();
        let original = webcam.image.clone().unwrap();

        ctx.catalog().delete_product(&admin, webcam.id).await.unwrap();
        ctx.storage().delete(&original).await.unwrap();

        let entries = ctx.audit().list(&admin).await.unwrap();
        let deleted: Vec<_> = entries.iter().filter(|e| e.kind == ChangeKind::Deleted).collect();
        assert_eq!(deleted.len(), 1);
        assert_eq!(deleted[0].product_id, None);
        assert_eq!(deleted[0].product_name, "Webcam");
        assert_eq!(deleted[0].user_id, Some(admin.actor().unwrap().user_id));

        let snapshot = deleted[0].image.as_deref().unwrap();
        assert!(snapshot.starts_with("history/"));
        assert!(!ctx.storage().read(snapshot).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_image_is_not_fatal() {
        let ctx = context().await;
        let admin = admin(&ctx).await;
        let brand = category(&ctx, &admin, "Logitech").await;

        let mut form = product_form("Webcam", brand.id, 5000, 2);
        form.image = ImageChange::Replace(png(30, 30));
        let webcam = ctx.catalog().create_product(&admin, form).await.unwrap();
        ctx.storage().delete(webcam.image.as_deref().unwrap()).await.unwrap();

        let entry = ctx.audit().prepare_deletion(&webcam).await;
        assert_eq!(entry.kind, ChangeKind::Deleted);
        assert!(entry.image.is_none());
    }

    #[tokio::test]
    async fn test_history_is_admin_only_and_searchable() {
        let ctx = context().await;
        let admin = admin(&ctx).await;
        let worker = worker(&ctx, "maria").await;
        let brand = category(&ctx, &admin, "Generic").await;
        product(&ctx, &admin, "Laptop", brand.id, 90000, 1).await;
        product(&ctx, &admin, "Keyboard", brand.id, 3000, 1).await;

        assert!(ctx.audit().list(&worker).await.is_err());

        let outcome = ctx.audit().search(&admin, "lap").await.unwrap();
        assert_eq!(outcome.results.len(), 1);

        let outcome = ctx.audit().search(&admin, "Labtop").await.unwrap();
        assert!(outcome.results.is_empty());
        assert_eq!(outcome.suggestions, vec!["Laptop".to_string()]);
    }
}
