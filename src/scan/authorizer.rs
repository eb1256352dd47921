/// Role-based inclusion filtering.
use std::collections::BTreeSet;

use crate::platform::RoleId;

/// A message counts iff its author currently holds at least one tracked
/// role. Authors who cannot be resolved to a role set at all are handled
/// upstream and never reach this check.
pub fn authorized(author_roles: &BTreeSet<RoleId>, tracked_roles: &BTreeSet<RoleId>) -> bool {
    !author_roles.is_disjoint(tracked_roles)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roles(ids: &[u64]) -> BTreeSet<RoleId> {
        ids.iter().copied().map(RoleId).collect()
    }

    #[test]
    fn any_single_tracked_role_suffices() {
        assert!(authorized(&roles(&[1, 2]), &roles(&[2, 9])));
    }

    #[test]
    fn empty_intersection_is_rejected() {
        assert!(!authorized(&roles(&[1, 2]), &roles(&[3, 4])));
    }

    #[test]
    fn no_roles_is_rejected() {
        assert!(!authorized(&roles(&[]), &roles(&[3])));
    }
}
