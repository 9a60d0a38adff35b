//! # Repository Module
//!
//! Database repository implementations for the back-office.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  Service operation (backoffice)                                        │
//! │       │                                                                 │
//! │       │  db.sales().create_with_lines(&sale, &lines)                   │
//! │       ▼                                                                 │
//! │  SaleRepository                                                        │
//! │  ├── one transaction per business operation                            │
//! │  ├── guarded stock updates                                             │
//! │  └── total recomputed before commit                                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! │                                                                         │
//! │  Permissions and form validation happen before a repository is        │
//! │  called; repositories only enforce what the schema can enforce.        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`UserRepository`](user::UserRepository) - Users and group memberships
//! - [`CategoryRepository`](category::CategoryRepository) - Category CRUD and search
//! - [`ProductRepository`](product::ProductRepository) - Product CRUD, search, audited writes
//! - [`HistoryRepository`](history::HistoryRepository) - Product audit trail
//! - [`CompanyRepository`](company::CompanyRepository) - Company profile singleton
//! - [`SaleRepository`](sale::SaleRepository) - Sale ledger and stock bookkeeping

pub mod category;
pub mod company;
pub mod history;
pub mod product;
pub mod sale;
pub mod user;

/// Builds a `LIKE` pattern matching `query` anywhere, with `%`, `_` and
/// `\` escaped. Use together with `ESCAPE '\'`.
///
/// SQLite's `LIKE` is case-insensitive for ASCII letters.
pub(crate) fn contains_pattern(query: &str) -> String {
    let mut pattern = String::with_capacity(query.len() + 2);
    pattern.push('%');
    for ch in query.trim().chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Fixtures shared by the repository tests.

    use bodega_core::User;

    use crate::pool::{Database, DbConfig};
    use crate::repository::category::NewCategory;
    use crate::repository::product::NewProduct;
    use crate::repository::user::NewUser;

    pub async fn database() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    pub async fn user(db: &Database, username: &str) -> User {
        db.users()
            .insert(&NewUser {
                username: username.to_string(),
                is_staff: false,
                is_superuser: false,
            })
            .await
            .unwrap()
    }

    pub async fn category(db: &Database, name: &str) -> i64 {
        db.categories()
            .insert(&NewCategory {
                name: name.to_string(),
                image: None,
                actor: None,
            })
            .await
            .unwrap()
            .id
    }

    pub fn new_product(name: &str, category_id: i64, price_cents: i64, quantity: i64) -> NewProduct {
        NewProduct {
            name: name.to_string(),
            description: None,
            price_cents,
            quantity,
            image: None,
            category_id,
            actor: None,
        }
    }

    pub async fn product(db: &Database, name: &str, category_id: i64, price_cents: i64, quantity: i64) -> i64 {
        db.products()
            .insert(&new_product(name, category_id, price_cents, quantity))
            .await
            .unwrap()
            .id
    }
}
