//! Role-based authorization.
//!
//! Instead of decorator-style role checks, every mutating operation takes
//! an explicit [`Auth`] value: the calling principal plus the roles the
//! host has granted it. Components match the value against the operation's
//! required role and return [`Error::Unauthorized`] on mismatch.

use crate::error::Error;
use crate::principal::Principal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Roles recognized by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Root role. Satisfies every role check.
    DefaultAdmin,
    /// Operational admin: pause/unpause, guardian verification, reputation.
    Admin,
    /// The Will Engine's role when calling into the vault and the
    /// guardian registry.
    WillManager,
    /// The scheduler adapter's role: `scheduler_perform`, `finalize_release`.
    Scheduler,
}

/// An authorization witness threaded into each mutating call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Auth {
    principal: Principal,
    roles: BTreeSet<Role>,
}

impl Auth {
    /// An authorization with no roles — an ordinary caller (owner,
    /// guardian, depositor). Ownership checks are done against the
    /// principal, not the role set.
    pub fn caller(principal: Principal) -> Self {
        Auth {
            principal,
            roles: BTreeSet::new(),
        }
    }

    /// Grant a role. Builder-style so tests read naturally.
    pub fn with_role(mut self, role: Role) -> Self {
        self.roles.insert(role);
        self
    }

    pub fn principal(&self) -> Principal {
        self.principal
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role) || self.roles.contains(&Role::DefaultAdmin)
    }

    /// Check the required role, surfacing `Unauthorized` when missing.
    pub fn require(&self, role: Role) -> Result<(), Error> {
        if self.has_role(role) {
            Ok(())
        } else {
            Err(Error::Unauthorized { required: role })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caller_has_no_roles() {
        let auth = Auth::caller(Principal::from_label(1));
        assert!(!auth.has_role(Role::Admin));
        assert!(auth.require(Role::Scheduler).is_err());
    }

    #[test]
    fn test_granted_role_passes() {
        let auth = Auth::caller(Principal::from_label(1)).with_role(Role::Scheduler);
        assert!(auth.require(Role::Scheduler).is_ok());
        assert!(auth.require(Role::Admin).is_err());
    }

    #[test]
    fn test_default_admin_satisfies_everything() {
        let auth = Auth::caller(Principal::from_label(1)).with_role(Role::DefaultAdmin);
        assert!(auth.require(Role::Admin).is_ok());
        assert!(auth.require(Role::WillManager).is_ok());
        assert!(auth.require(Role::Scheduler).is_ok());
    }

    #[test]
    fn test_unauthorized_names_the_role() {
        let auth = Auth::caller(Principal::from_label(1));
        match auth.require(Role::WillManager) {
            Err(Error::Unauthorized { required }) => assert_eq!(required, Role::WillManager),
            other => panic!("expected Unauthorized, got {:?}", other),
        }
    }
}
