use std::collections::HashSet;

use crate::identity::{Identity, Need};
use crate::users::repo_types::RoleCode;

/// A named permission: one or more alternative need sets. An identity is
/// allowed when its needs intersect at least one alternative. Every permission
/// defined in this crate is a flat disjunction of single role needs, but the
/// representation supports richer alternatives.
#[derive(Debug, Clone)]
pub struct Permission {
    alternatives: Vec<HashSet<Need>>,
}

impl Permission {
    pub fn new(needs: impl IntoIterator<Item = Need>) -> Self {
        Self {
            alternatives: vec![needs.into_iter().collect()],
        }
    }

    pub fn or(mut self, needs: impl IntoIterator<Item = Need>) -> Self {
        self.alternatives.push(needs.into_iter().collect());
        self
    }

    /// Evaluated fresh per request; denial is a boolean, not an error.
    pub fn allows(&self, identity: &Identity) -> bool {
        self.alternatives
            .iter()
            .any(|alternative| alternative.iter().any(|need| identity.provides(need)))
    }
}

pub fn admin_only() -> Permission {
    Permission::new([Need::Role(RoleCode::Admin)])
}

pub fn manager_or_admin() -> Permission {
    Permission::new([Need::Role(RoleCode::Manager)]).or([Need::Role(RoleCode::Admin)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::resolve;
    use crate::users::repo_types::User;
    use time::OffsetDateTime;

    fn identity_with_role(role: RoleCode) -> Identity {
        resolve(Some(User {
            id: 1,
            alternative_id: "alt".into(),
            email: "user@example.com".into(),
            phone_number: "0333000100".into(),
            first_name: None,
            last_name: None,
            password_hash: None,
            avatar_url: None,
            activated: true,
            created_at: OffsetDateTime::UNIX_EPOCH,
            verified_at: None,
            role,
        }))
    }

    #[test]
    fn manager_or_admin_admits_either_role() {
        let gate = manager_or_admin();
        assert!(gate.allows(&identity_with_role(RoleCode::Manager)));
        assert!(gate.allows(&identity_with_role(RoleCode::Admin)));
    }

    #[test]
    fn manager_or_admin_denies_envoy() {
        assert!(!manager_or_admin().allows(&identity_with_role(RoleCode::Envoy)));
    }

    #[test]
    fn admin_only_denies_manager() {
        assert!(!admin_only().allows(&identity_with_role(RoleCode::Manager)));
        assert!(admin_only().allows(&identity_with_role(RoleCode::Admin)));
    }

    #[test]
    fn anonymous_identity_is_always_denied() {
        let anonymous = Identity::anonymous();
        assert!(!admin_only().allows(&anonymous));
        assert!(!manager_or_admin().allows(&anonymous));
    }

    #[test]
    fn user_need_alternative_admits_that_user_only() {
        let gate = Permission::new([Need::User(1)]);
        assert!(gate.allows(&identity_with_role(RoleCode::Envoy)));

        let gate = Permission::new([Need::User(2)]);
        assert!(!gate.allows(&identity_with_role(RoleCode::Envoy)));
    }
}
