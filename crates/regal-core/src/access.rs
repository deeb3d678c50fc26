//! # Access Control
//!
//! The role model and the authorization predicate.
//!
//! Authorization is one pure function over (role, required roles). Handlers
//! call it once per request with the role decoded from the JWT; nothing
//! here knows about tokens, extractors, or the web framework.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// =============================================================================
// Role
// =============================================================================

/// Staff roles, flat (no inheritance besides the admin override).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Full access, including user management.
    Admin,
    /// Inventory and pricing management.
    Manager,
    /// Point-of-sale operations.
    Cashier,
}

impl Role {
    /// Parses a role from its wire/storage form.
    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "admin" => Some(Role::Admin),
            "manager" => Some(Role::Manager),
            "cashier" => Some(Role::Cashier),
            _ => None,
        }
    }

    /// The wire/storage form of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::Cashier => "cashier",
        }
    }
}

// =============================================================================
// Authorization Predicate
// =============================================================================

/// Role sets for the common endpoint tiers.
pub const ADMIN_ONLY: &[Role] = &[Role::Admin];
pub const MANAGER_UP: &[Role] = &[Role::Admin, Role::Manager];
pub const STAFF: &[Role] = &[Role::Admin, Role::Manager, Role::Cashier];

/// Returns whether `role` may perform an action restricted to `required`.
///
/// An empty `required` slice means the action is open to any
/// authenticated user. Admin is always allowed.
pub fn authorize(role: Role, required: &[Role]) -> bool {
    if role == Role::Admin || required.is_empty() {
        return true;
    }

    required.contains(&role)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse_roundtrip() {
        for role in [Role::Admin, Role::Manager, Role::Cashier] {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
        assert_eq!(Role::parse("superuser"), None);
    }

    #[test]
    fn test_admin_always_allowed() {
        assert!(authorize(Role::Admin, ADMIN_ONLY));
        assert!(authorize(Role::Admin, MANAGER_UP));
        assert!(authorize(Role::Admin, STAFF));
        assert!(authorize(Role::Admin, &[]));
    }

    #[test]
    fn test_manager_scope() {
        assert!(authorize(Role::Manager, MANAGER_UP));
        assert!(authorize(Role::Manager, STAFF));
        assert!(!authorize(Role::Manager, ADMIN_ONLY));
    }

    #[test]
    fn test_cashier_scope() {
        assert!(authorize(Role::Cashier, STAFF));
        assert!(!authorize(Role::Cashier, MANAGER_UP));
        assert!(!authorize(Role::Cashier, ADMIN_ONLY));
    }

    #[test]
    fn test_empty_required_is_open() {
        assert!(authorize(Role::Cashier, &[]));
    }
}
