//! Access resolution and last-administrator protection
//!
//! Grants are (user, forum, level) rows with at most one row per pair.
//! Resolution walks the forum tree upward: a grant on an ancestor forum
//! covers every descendant. The walk is an explicit loop with a visited-set
//! guard rather than recursion, so a corrupted parent chain can never hang
//! or overflow the resolver.

use crate::hierarchy::ForumTree;
use crate::types::{AccessLevel, ForumId, UserId};
use crate::{Error, Result};
use std::collections::{HashMap, HashSet};
use tracing::warn;

/// Grant table plus the ancestor-walking permission query
#[derive(Debug, Default, Clone)]
pub struct AccessResolver {
    /// Per-forum grant rows (user -> level)
    grants: HashMap<ForumId, HashMap<UserId, AccessLevel>>,
}

impl AccessResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert a grant: a second grant for the same (user, forum) replaces
    /// the level instead of creating a duplicate row.
    pub fn grant(&mut self, forum: ForumId, user: UserId, level: AccessLevel) {
        self.grants.entry(forum).or_default().insert(user, level);
    }

    /// Remove a grant. Returns the removed level, if any.
    pub fn revoke(&mut self, forum: ForumId, user: UserId) -> Option<AccessLevel> {
        let removed = self.grants.get_mut(&forum)?.remove(&user);
        if self.grants.get(&forum).is_some_and(|g| g.is_empty()) {
            self.grants.remove(&forum);
        }
        removed
    }

    /// Drop every grant row for a forum (forum deletion)
    pub fn revoke_all(&mut self, forum: ForumId) {
        self.grants.remove(&forum);
    }

    /// The direct grant for (user, forum), ignoring inheritance
    pub fn level_for(&self, forum: ForumId, user: UserId) -> Option<AccessLevel> {
        self.grants.get(&forum)?.get(&user).copied()
    }

    /// All grant rows on a forum
    pub fn grants_for_forum(&self, forum: ForumId) -> Vec<(UserId, AccessLevel)> {
        self.grants
            .get(&forum)
            .map(|g| g.iter().map(|(u, l)| (*u, *l)).collect())
            .unwrap_or_default()
    }

    /// Forums on which the user holds a direct grant
    pub fn forums_for_user(&self, user: UserId) -> Vec<(ForumId, AccessLevel)> {
        self.grants
            .iter()
            .filter_map(|(f, g)| g.get(&user).map(|l| (*f, *l)))
            .collect()
    }

    /// Number of Admin grants on a forum
    pub fn admin_count(&self, forum: ForumId) -> usize {
        self.grants
            .get(&forum)
            .map(|g| g.values().filter(|l| l.is_admin()).count())
            .unwrap_or(0)
    }

    /// Whether `user` holds at least `required` on `forum`, directly or via
    /// an ancestor. Pure read; a missing forum resolves to false.
    pub fn has_access(
        &self,
        tree: &ForumTree,
        forum: ForumId,
        user: UserId,
        required: AccessLevel,
    ) -> bool {
        let mut current = Some(forum);
        let mut visited = HashSet::new();

        while let Some(id) = current {
            if !visited.insert(id) {
                // Only reachable if the acyclicity invariant was violated
                // outside this crate's mutation paths.
                warn!(forum = %id, "cycle encountered in forum parent chain; denying access");
                return false;
            }
            let Some(node) = tree.get(id) else {
                return false;
            };
            if let Some(level) = self.level_for(id, user) {
                if level.satisfies(required) {
                    return true;
                }
            }
            current = node.parent;
        }

        false
    }
}

/// Guard ensuring a forum with any grants keeps at least one Admin.
pub struct AdminGuard;

impl AdminGuard {
    /// Check whether the grant for (forum, target) may be revoked
    /// (`new_level == None`) or changed to `new_level`.
    ///
    /// Only refuses when the current grant is Admin, the replacement is not,
    /// and no other Admin grant remains on the forum. Must be called under
    /// the same exclusive lock that applies the mutation; a stale count is
    /// unsafe.
    pub fn check(
        resolver: &AccessResolver,
        forum: ForumId,
        target: UserId,
        new_level: Option<AccessLevel>,
    ) -> Result<()> {
        let current = resolver.level_for(forum, target);
        let losing_admin = current.is_some_and(|l| l.is_admin())
            && !new_level.is_some_and(|l| l.is_admin());

        if losing_admin && resolver.admin_count(forum) <= 1 {
            return Err(Error::Conflict(
                "cannot remove the last administrator of a forum".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::Forum;
    use proptest::prelude::*;

    fn tree_with_chain(depth: usize) -> (ForumTree, Vec<ForumId>) {
        let mut tree = ForumTree::new();
        let mut ids = Vec::new();
        let mut parent = None;
        for i in 0..depth {
            let forum = Forum::new(format!("level-{i}"), String::new(), parent, 0);
            let id = forum.id;
            tree.insert(forum);
            ids.push(id);
            parent = Some(id);
        }
        (tree, ids)
    }

    #[test]
    fn test_grant_upserts() {
        let mut resolver = AccessResolver::new();
        let forum = ForumId::new();
        let user = UserId::new();

        resolver.grant(forum, user, AccessLevel::Write);
        resolver.grant(forum, user, AccessLevel::Read);

        assert_eq!(resolver.level_for(forum, user), Some(AccessLevel::Read));
        assert_eq!(resolver.grants_for_forum(forum).len(), 1);
    }

    #[test]
    fn test_direct_access_levels() {
        let (tree, ids) = tree_with_chain(1);
        let forum = ids[0];
        let user = UserId::new();
        let mut resolver = AccessResolver::new();

        assert!(!resolver.has_access(&tree, forum, user, AccessLevel::Read));

        resolver.grant(forum, user, AccessLevel::Write);
        assert!(resolver.has_access(&tree, forum, user, AccessLevel::Read));
        assert!(resolver.has_access(&tree, forum, user, AccessLevel::Write));
        assert!(!resolver.has_access(&tree, forum, user, AccessLevel::Admin));
    }

    #[test]
    fn test_inherited_access_deep_chain() {
        let (tree, ids) = tree_with_chain(6);
        let user = UserId::new();
        let mut resolver = AccessResolver::new();

        // Grant on the root only; the leaf is five levels down.
        resolver.grant(ids[0], user, AccessLevel::Write);

        let leaf = *ids.last().unwrap();
        assert!(resolver.has_access(&tree, leaf, user, AccessLevel::Read));
        assert!(resolver.has_access(&tree, leaf, user, AccessLevel::Write));
        assert!(!resolver.has_access(&tree, leaf, user, AccessLevel::Admin));
    }

    #[test]
    fn test_inheritance_does_not_flow_upward() {
        let (tree, ids) = tree_with_chain(2);
        let user = UserId::new();
        let mut resolver = AccessResolver::new();

        resolver.grant(ids[1], user, AccessLevel::Admin);
        assert!(!resolver.has_access(&tree, ids[0], user, AccessLevel::Read));
    }

    #[test]
    fn test_missing_forum_resolves_false() {
        let (tree, _) = tree_with_chain(1);
        let resolver = AccessResolver::new();
        assert!(!resolver.has_access(&tree, ForumId::new(), UserId::new(), AccessLevel::Read));
    }

    #[test]
    fn test_cycle_guard_denies_instead_of_looping() {
        let (mut tree, ids) = tree_with_chain(2);
        // Corrupt the tree: root's parent points at its own child.
        tree.set_parent(ids[0], Some(ids[1]));

        let resolver = AccessResolver::new();
        assert!(!resolver.has_access(&tree, ids[1], UserId::new(), AccessLevel::Read));
    }

    #[test]
    fn test_admin_guard_blocks_last_admin() {
        let mut resolver = AccessResolver::new();
        let forum = ForumId::new();
        let admin = UserId::new();
        resolver.grant(forum, admin, AccessLevel::Admin);

        assert!(AdminGuard::check(&resolver, forum, admin, None).is_err());
        assert!(AdminGuard::check(&resolver, forum, admin, Some(AccessLevel::Write)).is_err());
        // Staying admin is always fine.
        assert!(AdminGuard::check(&resolver, forum, admin, Some(AccessLevel::Admin)).is_ok());
    }

    #[test]
    fn test_admin_guard_allows_with_second_admin() {
        let mut resolver = AccessResolver::new();
        let forum = ForumId::new();
        let first = UserId::new();
        let second = UserId::new();
        resolver.grant(forum, first, AccessLevel::Admin);
        resolver.grant(forum, second, AccessLevel::Admin);

        assert!(AdminGuard::check(&resolver, forum, first, None).is_ok());
    }

    #[test]
    fn test_admin_guard_ignores_non_admin_grants() {
        let mut resolver = AccessResolver::new();
        let forum = ForumId::new();
        let admin = UserId::new();
        let reader = UserId::new();
        resolver.grant(forum, admin, AccessLevel::Admin);
        resolver.grant(forum, reader, AccessLevel::Read);

        assert!(AdminGuard::check(&resolver, forum, reader, None).is_ok());
    }

    proptest! {
        // An admin grant anywhere on the ancestor chain satisfies every
        // required level at every depth below it.
        #[test]
        fn prop_admin_satisfies_all_levels(depth in 1usize..8, grant_at in 0usize..8) {
            let grant_at = grant_at % depth;
            let (tree, ids) = tree_with_chain(depth);
            let user = UserId::new();
            let mut resolver = AccessResolver::new();
            resolver.grant(ids[grant_at], user, AccessLevel::Admin);

            for id in &ids[grant_at..] {
                for required in [AccessLevel::Read, AccessLevel::Write, AccessLevel::Admin] {
                    prop_assert!(resolver.has_access(&tree, *id, user, required));
                }
            }
        }
    }
}
