//! # Company Service
//!
//! The company profile printed on reports and receipts. It is read far
//! more often than it is written, so `AppContext` keeps a copy that is
//! loaded at startup and replaced after every save.

use tracing::info;

use crate::error::ApiResult;
use crate::services::{check_image, resolve_image, written_with_image};
use crate::state::AppContext;
use crate::storage::prefix;
use bodega_core::validation::{validate_email, validate_name, validate_tax_id};
use bodega_core::{CompanyForm, CompanyProfile, CoreError, Session};
use bodega_db::CompanyUpdate;

#[derive(Debug, Clone, Copy)]
pub struct CompanyService<'a> {
    ctx: &'a AppContext,
}

impl<'a> CompanyService<'a> {
    pub fn new(ctx: &'a AppContext) -> Self {
        CompanyService { ctx }
    }

    /// The cached profile, or `NotConfigured` when none was saved.
    pub async fn current(&self) -> ApiResult<CompanyProfile> {
        self.ctx
            .company_profile()
            .await
            .ok_or_else(|| CoreError::CompanyNotConfigured.into())
    }

    /// The profile for the settings screen. Admin only.
    pub async fn get(&self, session: &Session) -> ApiResult<Option<CompanyProfile>> {
        session.require_admin("view the company profile")?;
        Ok(self.ctx.company_profile().await)
    }

    /// Saves the profile and refreshes the cached copy.
    pub async fn update(&self, session: &Session, form: CompanyForm) -> ApiResult<CompanyProfile> {
        let actor = session.require_admin("edit the company profile")?;

        let name = validate_name("company name", &form.name)?;
        let tax_id = validate_tax_id(form.tax_id.as_deref())?;
        let email = validate_email(form.email.as_deref())?;
        check_image(&form.logo)?;

        let current = self.ctx.db().company().get().await?;
        let logo = resolve_image(
            self.ctx,
            current.as_ref().and_then(|c| c.logo.as_deref()),
            &form.logo,
            prefix::COMPANY,
        )
        .await?;

        let written = self
            .ctx
            .db()
            .company()
            .upsert(&CompanyUpdate {
                name,
                tax_id,
                email,
                logo: logo.clone(),
            })
            .await;
        let profile = written_with_image(self.ctx, &form.logo, logo.as_deref(), written).await?;
        self.ctx.set_company_profile(Some(profile.clone())).await;

        info!(user = %actor.username, name = %profile.name, "Company profile updated");
        Ok(profile)
    }

    /// Re-reads the profile from the database into the cache.
    pub async fn reload(&self) -> ApiResult<Option<CompanyProfile>> {
        let profile = self.ctx.db().company().get().await?;
        self.ctx.set_company_profile(profile.clone()).await;
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::services::test_support::*;
    use bodega_core::ImageChange;

    fn form(name: &str) -> CompanyForm {
        CompanyForm {
            name: name.to_string(),
            tax_id: Some("900-123".to_string()),
            email: Some("ventas@bodega.test".to_string()),
            logo: ImageChange::Keep,
        }
    }

    #[tokio::test]
    async fn test_current_is_not_configured_until_saved() {
        let ctx = context().await;
        let admin = admin(&ctx).await;

        let err = ctx.company().current().await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NotConfigured);

        ctx.company().update(&admin, form("Bodega")).await.unwrap();

        let profile = ctx.company().current().await.unwrap();
        assert_eq!(profile.name, "Bodega");
        assert_eq!(profile.tax_id.as_deref(), Some("900-123"));
    }

    #[tokio::test]
    async fn test_logo_is_kept_across_edits() {
        let ctx = context().await;
        let admin = admin(&ctx).await;

        let mut first = form("Bodega");
        first.logo = ImageChange::Replace(png(1000, 500));
        let saved = ctx.company().update(&admin, first).await.unwrap();
        let logo = saved.logo.clone().unwrap();
        assert!(logo.starts_with("company/"));

        let renamed = ctx.company().update(&admin, form("Bodega Central")).await.unwrap();
        assert_eq!(renamed.logo.as_deref(), Some(logo.as_str()));

        let mut cleared = form("Bodega Central");
        cleared.logo = ImageChange::Clear;
        assert!(ctx.company().update(&admin, cleared).await.unwrap().logo.is_none());
    }

    #[tokio::test]
    async fn test_invalid_profile_is_rejected() {
        let ctx = context().await;
        let admin = admin(&ctx).await;

        let mut bad_email = form("Bodega");
        bad_email.email = Some("not-an-email".to_string());
        let err = ctx.company().update(&admin, bad_email).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);

        let mut bad_tax_id = form("Bodega");
        bad_tax_id.tax_id = Some("NIT ABC".to_string());
        assert!(ctx.company().update(&admin, bad_tax_id).await.is_err());

        assert!(ctx.company().current().await.is_err());
    }

    #[tokio::test]
    async fn test_failed_save_discards_new_logo() {
        let (ctx, storage) = context_with_storage().await;
        let admin = admin(&ctx).await;
        reject_writes(&ctx, "company_profile").await;

        let mut with_logo = form("Bodega");
        with_logo.logo = ImageChange::Replace(png(100, 50));
        assert!(ctx.company().update(&admin, with_logo).await.is_err());

        assert!(storage.is_empty().await);
        assert!(ctx.company().current().await.is_err());
    }

    #[tokio::test]
    async fn test_only_admins_edit_the_profile() {
        let ctx = context().await;
        let maria = worker(&ctx, "maria").await;

        let err = ctx.company().update(&maria, form("Bodega")).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::Forbidden);
        assert!(ctx.company().get(&maria).await.is_err());
    }

    #[tokio::test]
    async fn test_reload_picks_up_external_writes() {
        let ctx = context().await;
        ctx.db()
            .company()
            .upsert(&CompanyUpdate {
                name: "Seeded".to_string(),
                tax_id: None,
                email: None,
                logo: None,
            })
            .await
            .unwrap();
        assert!(ctx.company_profile().await.is_none());

        let profile = ctx.company().reload().await.unwrap().unwrap();
        assert_eq!(profile.name, "Seeded");
        assert_eq!(ctx.company().current().await.unwrap().name, "Seeded");
    }
}
