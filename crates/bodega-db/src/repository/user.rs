//! # User Repository
//!
//! Local copy of the identity provider's users and their group
//! memberships. Authentication itself happens elsewhere; this repository
//! only resolves a username into an [`Actor`].

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::collections::HashMap;
use tracing::debug;

use crate::error::{DbError, DbResult};
use bodega_core::{Actor, User};

/// Fields of a user registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub is_staff: bool,
    pub is_superuser: bool,
}

const USER_COLUMNS: &str = "id, username, is_staff, is_superuser, created_at";

/// Repository for user database operations.
#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    /// Creates a new UserRepository.
    pub fn new(pool: SqlitePool) -> Self {
        UserRepository { pool }
    }

    /// Registers a user.
    ///
    /// ## Errors
    /// `UniqueViolation` when the username is taken.
    pub async fn insert(&self, user: &NewUser) -> DbResult<User> {
        debug!(username = %user.username, "Inserting user");

        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO users (username, is_staff, is_superuser, created_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&user.username)
        .bind(user.is_staff)
        .bind(user.is_superuser)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => DbError::duplicate(field, user.username.clone()),
            other => other,
        })?;

        let id = result.last_insert_rowid();
        self.get(id)
            .await?
            .ok_or_else(|| DbError::not_found("User", id))
    }

    /// Gets a user by ID.
    pub async fn get(&self, id: i64) -> DbResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// Gets a user by username (exact match).
    pub async fn get_by_username(&self, username: &str) -> DbResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = ?1"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Adds a user to a group. Adding twice is a no-op.
    pub async fn add_to_group(&self, user_id: i64, group: &str) -> DbResult<()> {
        debug!(user_id, group, "Adding user to group");

        sqlx::query("INSERT OR IGNORE INTO user_groups (user_id, group_name) VALUES (?1, ?2)")
            .bind(user_id)
            .bind(group)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Group names of a user, sorted.
    pub async fn groups_of(&self, user_id: i64) -> DbResult<Vec<String>> {
        let groups: Vec<String> = sqlx::query_scalar(
            "SELECT group_name FROM user_groups WHERE user_id = ?1 ORDER BY group_name",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(groups)
    }

    /// Resolves a username into an actor with its groups.
    pub async fn load_actor(&self, username: &str) -> DbResult<Option<Actor>> {
        let Some(user) = self.get_by_username(username).await? else {
            return Ok(None);
        };
        let groups = self.groups_of(user.id).await?;

        Ok(Some(Actor::from_user(&user, groups)))
    }

    /// Usernames keyed by user id. Unknown ids are absent from the map.
    pub async fn usernames_by_ids(&self, ids: &[i64]) -> DbResult<HashMap<i64, String>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT id, username FROM users WHERE id IN (");
        let mut separated = query.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");

        let rows: Vec<(i64, String)> = query.build_query_as().fetch_all(&self.pool).await?;
        Ok(rows.into_iter().collect())
    }

    /// Users that sold at least one sale, by username.
    pub async fn sellers(&self) -> DbResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE id IN (SELECT DISTINCT seller_id FROM sales) \
             ORDER BY username"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    /// Members of a group, by username.
    pub async fn members_of(&self, group: &str) -> DbResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE id IN (SELECT user_id FROM user_groups WHERE group_name = ?1) \
             ORDER BY username"
        ))
        .bind(group)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    /// Counts users (for diagnostics and the seed tool).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{database, user};
    use bodega_core::access::{Landing, WORKERS_GROUP};

    #[tokio::test]
    async fn test_insert_and_lookup() {
        let db = database().await;
        let maria = user(&db, "maria").await;

        let found = db.users().get_by_username("maria").await.unwrap().unwrap();
        assert_eq!(found.id, maria.id);
        assert!(!found.is_staff);
        assert!(db.users().get_by_username("nobody").await.unwrap().is_none());
        assert_eq!(db.users().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_username() {
        let db = database().await;
        user(&db, "maria").await;

        let err = db
            .users()
            .insert(&NewUser {
                username: "maria".to_string(),
                is_staff: true,
                is_superuser: false,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_groups_and_actor() {
        let db = database().await;
        let maria = user(&db, "maria").await;
        db.users().add_to_group(maria.id, WORKERS_GROUP).await.unwrap();
        db.users().add_to_group(maria.id, WORKERS_GROUP).await.unwrap();

        assert_eq!(db.users().groups_of(maria.id).await.unwrap(), vec![WORKERS_GROUP]);

        let actor = db.users().load_actor("maria").await.unwrap().unwrap();
        assert_eq!(actor.landing(), Landing::Sales);

        let members = db.users().members_of(WORKERS_GROUP).await.unwrap();
        assert_eq!(members.len(), 1);
        assert!(db.users().members_of("Other").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_usernames_by_ids() {
        let db = database().await;
        let a = user(&db, "ana").await;
        let b = user(&db, "beto").await;

        let names = db.users().usernames_by_ids(&[a.id, b.id, 999]).await.unwrap();
        assert_eq!(names.len(), 2);
        assert_eq!(names[&a.id], "ana");
        assert!(db.users().usernames_by_ids(&[]).await.unwrap().is_empty());
    }
}
