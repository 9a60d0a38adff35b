//! # Access Rules
//!
//! The identity provider authenticates users; this module only answers the
//! two questions the back-office asks of an actor:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Session                                                                │
//! │    │                                                                    │
//! │    ├── Anonymous ─────────────► NotAuthenticated                        │
//! │    │                                                                    │
//! │    └── Authenticated(actor)                                             │
//! │           │                                                             │
//! │           ├── require_login()      → any actor                          │
//! │           └── require_admin(action)→ staff or superuser, else Forbidden │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::types::User;

/// Group whose members land on the sales screen after login.
pub const WORKERS_GROUP: &str = "Trabajadores";

/// An authenticated user as seen by the services.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Actor {
    pub user_id: i64,
    pub username: String,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub groups: Vec<String>,
}

/// Screen a user is sent to after a successful login.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum Landing {
    Inventory,
    Sales,
}

impl Actor {
    pub fn from_user(user: &User, groups: Vec<String>) -> Self {
        Actor {
            user_id: user.id,
            username: user.username.clone(),
            is_staff: user.is_staff,
            is_superuser: user.is_superuser,
            groups,
        }
    }

    /// Staff or superuser.
    pub fn is_admin(&self) -> bool {
        self.is_staff || self.is_superuser
    }

    pub fn in_group(&self, group: &str) -> bool {
        self.groups.iter().any(|g| g == group)
    }

    /// Superusers go to the inventory, workers to sales, everyone else to
    /// the inventory.
    pub fn landing(&self) -> Landing {
        if self.is_superuser {
            Landing::Inventory
        } else if self.in_group(WORKERS_GROUP) {
            Landing::Sales
        } else {
            Landing::Inventory
        }
    }

    /// Superusers list every sale; other users only the ones they sold.
    pub fn sees_all_sales(&self) -> bool {
        self.is_superuser
    }

    /// Seller filter to apply when listing sales for this actor.
    pub fn sales_visibility(&self) -> Option<i64> {
        if self.sees_all_sales() {
            None
        } else {
            Some(self.user_id)
        }
    }
}

/// The caller of a service operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Session {
    #[default]
    Anonymous,
    Authenticated(Actor),
}

impl Session {
    pub fn actor(&self) -> Option<&Actor> {
        match self {
            Session::Anonymous => None,
            Session::Authenticated(actor) => Some(actor),
        }
    }

    /// Any logged-in actor.
    pub fn require_login(&self) -> CoreResult<&Actor> {
        self.actor().ok_or(CoreError::NotAuthenticated)
    }

    /// A logged-in actor that is staff or superuser.
    ///
    /// `action` is a short phrase used in the error ("delete products").
    pub fn require_admin(&self, action: &str) -> CoreResult<&Actor> {
        let actor = self.require_login()?;
        if actor.is_admin() {
            Ok(actor)
        } else {
            Err(CoreError::Forbidden {
                username: actor.username.clone(),
                action: action.to_string(),
            })
        }
    }

    /// A logged-in staff actor (superuser alone is not enough).
    pub fn require_staff(&self, action: &str) -> CoreResult<&Actor> {
        let actor = self.require_login()?;
        if actor.is_staff {
            Ok(actor)
        } else {
            Err(CoreError::Forbidden {
                username: actor.username.clone(),
                action: action.to_string(),
            })
        }
    }
}

impl From<Actor> for Session {
    fn from(actor: Actor) -> Self {
        Session::Authenticated(actor)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn actor(is_staff: bool, is_superuser: bool, groups: &[&str]) -> Actor {
        Actor {
            user_id: 7,
            username: "maria".to_string(),
            is_staff,
            is_superuser,
            groups: groups.iter().map(|g| g.to_string()).collect(),
        }
    }

    #[test]
    fn test_landing() {
        assert_eq!(actor(false, true, &[WORKERS_GROUP]).landing(), Landing::Inventory);
        assert_eq!(actor(false, false, &[WORKERS_GROUP]).landing(), Landing::Sales);
        assert_eq!(actor(true, false, &[]).landing(), Landing::Inventory);
        assert_eq!(actor(false, false, &["Other"]).landing(), Landing::Inventory);
    }

    #[test]
    fn test_require_admin() {
        let anonymous = Session::Anonymous;
        assert!(matches!(
            anonymous.require_admin("edit"),
            Err(CoreError::NotAuthenticated)
        ));

        let worker = Session::from(actor(false, false, &[WORKERS_GROUP]));
        assert!(worker.require_login().is_ok());
        assert!(matches!(
            worker.require_admin("edit products"),
            Err(CoreError::Forbidden { .. })
        ));

        assert!(Session::from(actor(true, false, &[])).require_admin("x").is_ok());
        assert!(Session::from(actor(false, true, &[])).require_admin("x").is_ok());
    }

    #[test]
    fn test_require_staff_rejects_plain_superuser() {
        assert!(Session::from(actor(false, true, &[])).require_staff("export").is_err());
        assert!(Session::from(actor(true, false, &[])).require_staff("export").is_ok());
    }

    #[test]
    fn test_sales_visibility() {
        assert_eq!(actor(true, true, &[]).sales_visibility(), None);
        assert_eq!(actor(true, false, &[]).sales_visibility(), Some(7));
    }
}
