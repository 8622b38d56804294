//! # Role Ranking
//!
//! Explicit role hierarchy for the authorization collaborators (the auth
//! layer itself is out of tree).
//!
//! The hierarchy is an explicit ordered ranking table, NOT the enum's
//! declaration order: reordering variants for readability must never
//! silently change who outranks whom.

use serde::{Deserialize, Serialize};

/// Staff role at the register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Manager,
    Cashier,
}

/// Ordered ranking table. Higher rank outranks lower.
const RANKING: &[(Role, u8)] = &[
    (Role::Cashier, 1),
    (Role::Manager, 2),
    (Role::Admin, 3),
];

impl Role {
    /// Numeric rank from the explicit table.
    pub fn rank(&self) -> u8 {
        RANKING
            .iter()
            .find(|(role, _)| role == self)
            .map(|(_, rank)| *rank)
            .unwrap_or(0)
    }

    /// Whether this role meets or exceeds `required`.
    ///
    /// ## Example
    /// ```rust
    /// use meridian_core::roles::Role;
    ///
    /// assert!(Role::Manager.at_least(Role::Cashier));
    /// assert!(!Role::Cashier.at_least(Role::Admin));
    /// ```
    pub fn at_least(&self, required: Role) -> bool {
        self.rank() >= required.rank()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ranking_is_total() {
        assert!(Role::Admin.at_least(Role::Manager));
        assert!(Role::Admin.at_least(Role::Cashier));
        assert!(Role::Manager.at_least(Role::Manager));
        assert!(!Role::Cashier.at_least(Role::Manager));
    }

    #[test]
    fn test_every_role_has_a_rank() {
        for role in [Role::Admin, Role::Manager, Role::Cashier] {
            assert!(role.rank() > 0);
        }
    }
}
