//! Per-request identity resolution.
//!
//! An [`Identity`] is built fresh on every request from the session's login
//! identifier and discarded afterwards; nothing here is cached across
//! requests, so an activation flip or an identifier rotation takes effect on
//! the very next request.

pub mod permission;

use std::collections::HashSet;

use crate::users::repo_types::{RoleCode, User};

/// Atomic capability token granted to a resolved identity for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Need {
    /// This specific user, by internal id.
    User(i64),
    /// Any user holding this role.
    Role(RoleCode),
}

/// Immutable per-request identity. Anonymous identities (no session, unknown
/// login identifier, or a deactivated account) carry an empty need set.
#[derive(Debug, Clone)]
pub struct Identity {
    user: Option<User>,
    needs: HashSet<Need>,
}

impl Identity {
    pub fn anonymous() -> Self {
        Self {
            user: None,
            needs: HashSet::new(),
        }
    }

    /// The resolved user, present only in the Resolved-Active state.
    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn needs(&self) -> &HashSet<Need> {
        &self.needs
    }

    pub fn provides(&self, need: &Need) -> bool {
        self.needs.contains(need)
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }
}

/// Derive an identity from the user a session's login identifier resolved to
/// (if any). Activation is a hard gate: a deactivated account yields the same
/// anonymous identity as no account at all, even when the session itself is
/// valid.
pub fn resolve(user: Option<User>) -> Identity {
    match user {
        Some(user) if user.activated => {
            let needs = HashSet::from([Need::User(user.id), Need::Role(user.role)]);
            Identity {
                user: Some(user),
                needs,
            }
        }
        _ => Identity::anonymous(),
    }
}
