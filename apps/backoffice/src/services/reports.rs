//! # Report Service
//!
//! Feeds the printable layouts of `bodega_core::report` with ledger data.
//!
//! ```text
//! SaleFilterInput ──► SaleFilter::parse ──► default_to_today (export only)
//!                                              │
//!                                              ▼
//!                          utc_bounds(offset) ──► SaleCriteria + visibility
//!                                              │
//!              ┌───────────────────────────────┴───────────────┐
//!              ▼                                               ▼
//!     sales_exist: EXISTS(..)                  export_sales: rows (oldest first)
//!                                                 + lines_for_sales
//!                                                 ──► ReportSale (local time)
//!                                                 ──► sales_report(..)
//! ```
//!
//! Dates in filters are local calendar days of the configured offset.

use chrono::{DateTime, Utc};
use tracing::info;

use crate::error::ApiResult;
use crate::state::AppContext;
use bodega_core::filter::{SaleFilter, SaleFilterInput};
use bodega_core::report::{
    receipt, sales_report, Document, ReceiptData, ReceiptLine, ReportContext, ReportLine, ReportSale,
};
use bodega_core::{Actor, CoreError, Session, DEFAULT_COMPANY_NAME};
use bodega_db::SaleCriteria;

/// Sales report and receipt generation.
#[derive(Debug, Clone, Copy)]
pub struct ReportService<'a> {
    ctx: &'a AppContext,
}

impl<'a> ReportService<'a> {
    pub fn new(ctx: &'a AppContext) -> Self {
        ReportService { ctx }
    }

    fn criteria(&self, actor: &Actor, filter: &SaleFilter) -> ApiResult<SaleCriteria> {
        let (from, until) = filter.utc_bounds(self.ctx.offset())?;
        Ok(SaleCriteria::from_filter(filter, from, until).visible_to(actor.sales_visibility()))
    }

    /// Whether any visible sale matches the filter. Used by the export form
    /// before it asks for the document.
    pub async fn sales_exist(&self, session: &Session, input: &SaleFilterInput) -> ApiResult<bool> {
        let actor = session.require_login()?;
        let filter = SaleFilter::parse(input)?;
        let criteria = self.criteria(actor, &filter)?;

        Ok(self.ctx.db().sales().exists(&criteria).await?)
    }

    /// Detailed sales report of the matching sales. Without dates the
    /// report covers the local day of `now`.
    ///
    /// ## Errors
    /// - `Forbidden` for non-staff users
    /// - `ValidationError` for malformed dates or an inverted range
    /// - `NoRecords` when nothing matches
    pub async fn export_sales(
        &self,
        session: &Session,
        input: &SaleFilterInput,
        now: DateTime<Utc>,
    ) -> ApiResult<Document> {
        let actor = session.require_staff("export sales")?;
        let offset = self.ctx.offset();
        let local_now = now.with_timezone(&offset);

        let filter = SaleFilter::parse(input)?.default_to_today(local_now.date_naive());
        let criteria = self.criteria(actor, &filter)?;

        let sales = self.ctx.db().sales();
        let rows = sales.report_rows(&criteria).await?;
        if rows.is_empty() {
            return Err(CoreError::NoMatchingSales.into());
        }

        let ids: Vec<i64> = rows.iter().map(|r| r.sale.id).collect();
        let mut lines = sales.lines_for_sales(&ids).await?;

        let report: Vec<ReportSale> = rows
            .into_iter()
            .map(|row| ReportSale {
                id: row.sale.id,
                customer: row.sale.customer.clone(),
                seller: row.seller_username,
                payment_method: row.sale.payment_method,
                total: row.sale.total(),
                created_at: row.sale.created_at.with_timezone(&offset),
                lines: lines
                    .remove(&row.sale.id)
                    .unwrap_or_default()
                    .iter()
                    .map(|l| ReportLine {
                        quantity: l.quantity,
                        product_name: l.display_name().to_string(),
                    })
                    .collect(),
            })
            .collect();

        let company_name = self
            .ctx
            .company_profile()
            .await
            .map(|c| c.name)
            .unwrap_or_else(|| DEFAULT_COMPANY_NAME.to_string());

        let document = sales_report(
            &report,
            &ReportContext {
                company_name,
                generated_at: local_now,
            },
        );

        info!(
            user = %actor.username,
            sales = report.len(),
            pages = document.pages.len(),
            "Sales report generated"
        );
        Ok(document)
    }

    /// Receipt of a visible sale.
    ///
    /// ## Errors
    /// - `NotFound` for unknown or invisible sales
    /// - `NotConfigured` while the company profile was never saved
    pub async fn receipt(&self, session: &Session, sale_id: i64) -> ApiResult<Document> {
        let actor = session.require_login()?;
        let summary = self.ctx.sales().visible_sale(actor, sale_id).await?;
        let company = self.ctx.company().current().await?;
        let lines = self.ctx.db().sales().lines(sale_id).await?;

        let data = ReceiptData {
            company_name: company.name,
            tax_id: company.tax_id,
            sale_id,
            customer: summary.sale.customer,
            seller: summary.seller_username,
            created_at: summary.sale.created_at.with_timezone(&self.ctx.offset()),
            lines: lines
                .iter()
                .map(|l| ReceiptLine {
                    quantity: l.quantity,
                    product_name: l.display_name().to_string(),
                    subtotal: l.subtotal(),
                })
                .collect(),
        };

        info!(sale_id, user = %actor.username, lines = data.lines.len(), "Receipt generated");
        Ok(receipt(&data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::services::test_support::*;
    use bodega_core::report::receipt_height;
    use bodega_core::{CompanyForm, ImageChange, PaymentMethod, SaleForm, SaleLineInput};

    fn range(start: &str, end: &str) -> SaleFilterInput {
        SaleFilterInput {
            start_date: Some(start.to_string()),
            end_date: Some(end.to_string()),
            ..Default::default()
        }
    }

    async fn sell(ctx: &AppContext, session: &Session, customer: &str, product_id: i64, quantity: i64) -> i64 {
        ctx.sales()
            .create_sale(
                session,
                SaleForm {
                    customer: customer.to_string(),
                    payment_method: PaymentMethod::Cash,
                    lines: vec![SaleLineInput {
                        product_id,
                        quantity,
                        unit_price: None,
                    }],
                },
            )
            .await
            .unwrap()
            .sale
            .id
    }

    fn all_texts(doc: &Document) -> Vec<String> {
        doc.pages
            .iter()
            .flat_map(|p| p.texts())
            .map(str::to_string)
            .collect()
    }

    async fn shop() -> (AppContext, Session, i64) {
        let ctx = context().await;
        let admin = admin(&ctx).await;
        let brand = category(&ctx, &admin, "Generic").await;
        let mouse = product(&ctx, &admin, "Mouse", brand.id, 1500, 50).await;
        (ctx, admin, mouse.id)
    }

    #[tokio::test]
    async fn test_export_defaults_to_today() {
        let (ctx, admin, mouse) = shop().await;
        sell(&ctx, &admin, "Ana", mouse, 2).await;

        let doc = ctx
            .reports()
            .export_sales(&admin, &SaleFilterInput::default(), Utc::now())
            .await
            .unwrap();

        let texts = all_texts(&doc);
        assert!(texts.iter().any(|t| t == "Ana"));
        assert!(texts.iter().any(|t| t.contains("Your company")));
        assert_eq!(doc.file_name, "sales.pdf");
    }

    #[tokio::test]
    async fn test_export_without_matches_is_no_records() {
        let (ctx, admin, mouse) = shop().await;
        sell(&ctx, &admin, "Ana", mouse, 2).await;

        let err = ctx
            .reports()
            .export_sales(&admin, &range("2000-01-01", "2000-01-31"), Utc::now())
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::NoRecords);
    }

    #[tokio::test]
    async fn test_bad_dates_are_client_errors() {
        let (ctx, admin, _) = shop().await;

        let err = ctx
            .reports()
            .sales_exist(&admin, &range("2024-13-01", "2024-12-31"))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);

        let err = ctx
            .reports()
            .export_sales(&admin, &range("2024-03-10", "2024-03-01"), Utc::now())
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
    }

    #[tokio::test]
    async fn test_sales_exist_honours_range_and_visibility() {
        let (ctx, admin, mouse) = shop().await;
        let maria = worker(&ctx, "maria").await;
        sell(&ctx, &admin, "Ana", mouse, 1).await;

        let today = Utc::now().date_naive().format("%Y-%m-%d").to_string();
        assert!(ctx.reports().sales_exist(&admin, &range(&today, &today)).await.unwrap());
        assert!(!ctx
            .reports()
            .sales_exist(&admin, &range("2000-01-01", "2000-01-02"))
            .await
            .unwrap());
        assert!(!ctx.reports().sales_exist(&maria, &SaleFilterInput::default()).await.unwrap());

        let err = ctx
            .reports()
            .sales_exist(&Session::Anonymous, &SaleFilterInput::default())
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Unauthenticated);
    }

    #[tokio::test]
    async fn test_export_is_staff_only_and_scoped_to_seller() {
        let (ctx, admin, mouse) = shop().await;
        let maria = worker(&ctx, "maria").await;
        let clerk = user(&ctx, "clerk", true, false).await;
        sell(&ctx, &admin, "Ana", mouse, 1).await;
        sell(&ctx, &clerk, "Luis", mouse, 1).await;

        let err = ctx
            .reports()
            .export_sales(&maria, &SaleFilterInput::default(), Utc::now())
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Forbidden);

        let doc = ctx
            .reports()
            .export_sales(&clerk, &SaleFilterInput::default(), Utc::now())
            .await
            .unwrap();
        let texts = all_texts(&doc);
        assert!(texts.iter().any(|t| t == "Luis"));
        assert!(!texts.iter().any(|t| t == "Ana"));
    }

    #[tokio::test]
    async fn test_receipt_needs_company_profile() {
        let (ctx, admin, mouse) = shop().await;
        let sale_id = sell(&ctx, &admin, "Ana", mouse, 3).await;

        let err = ctx.reports().receipt(&admin, sale_id).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NotConfigured);

        ctx.company()
            .update(
                &admin,
                CompanyForm {
                    name: "Bodega Central".to_string(),
                    tax_id: Some("900123".to_string()),
                    email: None,
                    logo: ImageChange::Keep,
                },
            )
            .await
            .unwrap();

        let doc = ctx.reports().receipt(&admin, sale_id).await.unwrap();
        assert_eq!(doc.pages.len(), 1);
        assert_eq!(doc.height, receipt_height(1));
        assert_eq!(doc.file_name, format!("sale_receipt_{}.pdf", sale_id));

        let texts = all_texts(&doc);
        assert!(texts.iter().any(|t| t == "Bodega Central"));
        assert!(texts.iter().any(|t| t == "NIT:900123"));
        assert!(texts.iter().any(|t| t == "Customer: Ana"));
    }

    #[tokio::test]
    async fn test_receipt_of_other_sellers_sale_is_not_found() {
        let (ctx, admin, mouse) = shop().await;
        let maria = worker(&ctx, "maria").await;
        let carlos = worker(&ctx, "carlos").await;
        let sale_id = sell(&ctx, &maria, "Ana", mouse, 1).await;

        let err = ctx.reports().receipt(&carlos, sale_id).await.unwrap_err();
        assert!(err.is_not_found());

        let err = ctx.reports().receipt(&admin, 999).await.unwrap_err();
        assert!(err.is_not_found());
    }
}
