//! # Search Service
//!
//! List-screen searches with "did you mean" suggestions.
//!
//! ```text
//! query ──► substring filter (SQL LIKE, case-insensitive)
//!              │
//!              ├── rows found ─────────────────────────► results
//!              │
//!              └── no rows, query typed by the user ──► suggestions from
//!                                                      the screen's name
//!                                                      universe (≤3, ≥0.6)
//! ```
//!
//! | Screen              | Universe                         |
//! |---------------------|----------------------------------|
//! | catalog products    | product names + category names   |
//! | sale product picker | product names + category names   |
//! | categories          | category names                   |
//! | history             | product names in the trail       |
//! | sales               | customer names (see `SalesService`) |

use std::future::Future;

use tracing::debug;

use crate::error::ApiResult;
use crate::state::AppContext;
use bodega_core::search::{suggestions, wants_suggestions, SearchOutcome};
use bodega_core::validation::validate_search_query;
use bodega_core::{Category, HistoryEntry, Product, Session};
use bodega_db::{DbError, DbResult};

/// Wraps `results`, loading the universe and computing suggestions only
/// when the search came back empty.
pub(crate) async fn search_outcome<T, F, Fut>(
    query: String,
    results: Vec<T>,
    from_suggestion: bool,
    universe: F,
) -> ApiResult<SearchOutcome<T>>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = DbResult<Vec<String>>>,
{
    if !wants_suggestions(&query, results.len(), from_suggestion) {
        return Ok(SearchOutcome::new(query, results));
    }

    let names = universe().await?;
    let found = suggestions(&query, &names);
    debug!(query = %query, suggestions = found.len(), "No results, suggesting");

    Ok(SearchOutcome::new(query, results).with_suggestions(found))
}

/// Catalog and history searches.
#[derive(Debug, Clone, Copy)]
pub struct SearchService<'a> {
    ctx: &'a AppContext,
}

impl<'a> SearchService<'a> {
    pub fn new(ctx: &'a AppContext) -> Self {
        SearchService { ctx }
    }

    /// Catalog product list. A blank query lists everything.
    pub async fn products(&self, session: &Session, query: &str) -> ApiResult<SearchOutcome<Product>> {
        session.require_login()?;
        self.product_search(query, false).await
    }

    /// Product picker of the sale form. Suggestions are skipped when the
    /// query is itself a clicked suggestion.
    pub async fn product_picker(
        &self,
        session: &Session,
        query: &str,
        from_suggestion: bool,
    ) -> ApiResult<SearchOutcome<Product>> {
        session.require_login()?;
        self.product_search(query, from_suggestion).await
    }

    async fn product_search(&self, query: &str, from_suggestion: bool) -> ApiResult<SearchOutcome<Product>> {
        let query = validate_search_query(query)?;
        let products = self.ctx.db().products();

        if query.is_empty() {
            return Ok(SearchOutcome::new(query, products.list().await?));
        }

        let results = products.search(&query).await?;
        search_outcome(query, results, from_suggestion, || async {
            let mut names = products.all_names().await?;
            names.extend(self.ctx.db().categories().all_names().await?);
            Ok::<_, DbError>(names)
        })
        .await
    }

    /// Category list.
    pub async fn categories(&self, session: &Session, query: &str) -> ApiResult<SearchOutcome<Category>> {
        session.require_login()?;
        let query = validate_search_query(query)?;
        let categories = self.ctx.db().categories();

        if query.is_empty() {
            return Ok(SearchOutcome::new(query, categories.list().await?));
        }

        let results = categories.search(&query).await?;
        search_outcome(query, results, false, || categories.all_names()).await
    }

    /// History list. Admin only.
    pub async fn history(&self, session: &Session, query: &str) -> ApiResult<SearchOutcome<HistoryEntry>> {
        self.ctx.audit().search(session, query).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::services::test_support::*;

    async fn shop() -> (AppContext, Session) {
        let ctx = context().await;
        let admin = admin(&ctx).await;
        let brand = category(&ctx, &admin, "Generic").await;
        for name in ["Laptop", "Mouse", "Keyboard"] {
            product(&ctx, &admin, name, brand.id, 1000, 5).await;
        }
        (ctx, admin)
    }

    #[tokio::test]
    async fn test_typo_suggests_close_name() {
        let (ctx, admin) = shop().await;

        let outcome = ctx.search().products(&admin, "Labtop").await.unwrap();
        assert!(outcome.results.is_empty());
        assert_eq!(outcome.suggestions, vec!["Laptop".to_string()]);

        let outcome = ctx.search().products(&admin, "Zzzzz").await.unwrap();
        assert!(outcome.results.is_empty());
        assert!(outcome.suggestions.is_empty());
    }

    #[tokio::test]
    async fn test_matches_are_case_insensitive_without_suggestions() {
        let (ctx, admin) = shop().await;

        let outcome = ctx.search().products(&admin, "mOuSe").await.unwrap();
        assert_eq!(outcome.results.len(), 1);
        assert!(outcome.suggestions.is_empty());

        let outcome = ctx.search().products(&admin, "  ").await.unwrap();
        assert_eq!(outcome.results.len(), 3);
    }

    #[tokio::test]
    async fn test_picker_skips_suggestions_for_clicked_suggestion() {
        let (ctx, admin) = shop().await;

        let typed = ctx.search().product_picker(&admin, "Labtop", false).await.unwrap();
        assert_eq!(typed.suggestions, vec!["Laptop".to_string()]);

        let clicked = ctx.search().product_picker(&admin, "Labtop", true).await.unwrap();
        assert!(clicked.suggestions.is_empty());
    }

    #[tokio::test]
    async fn test_category_search_suggests_category_names() {
        let (ctx, admin) = shop().await;
        category(&ctx, &admin, "Samsung").await;

        let outcome = ctx.search().categories(&admin, "Samsng").await.unwrap();
        assert!(outcome.results.is_empty());
        assert_eq!(outcome.suggestions, vec!["Samsung".to_string()]);
    }

    #[tokio::test]
    async fn test_search_requires_login() {
        let (ctx, _) = shop().await;
        let err = ctx.search().products(&Session::Anonymous, "mouse").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::Unauthenticated);
    }
}
