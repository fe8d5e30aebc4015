//! Forum tree management
//!
//! Forums form a tree: each forum optionally references a parent by
//! identifier only, and children are derived by scanning, never stored.
//! Acyclicity and per-level case-insensitive name uniqueness are enforced
//! here, at mutation time; nothing else in the crate writes the tree.

use crate::access::{AccessResolver, AdminGuard};
use crate::types::{AccessLevel, ForumId, UserId};
use crate::{now_secs, Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// A named node in the forum tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Forum {
    /// Unique identifier
    pub id: ForumId,

    /// Display name, unique (case-insensitively) among siblings
    pub name: String,

    /// Free-form description
    pub description: String,

    /// Parent forum, if this is a subforum
    pub parent: Option<ForumId>,

    /// Creation timestamp (seconds since epoch)
    pub created_at: u64,
}

impl Forum {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parent: Option<ForumId>,
        created_at: u64,
    ) -> Self {
        Self {
            id: ForumId::new(),
            name: name.into(),
            description: description.into(),
            parent,
            created_at,
        }
    }
}

/// The forum table, indexed by id
#[derive(Debug, Default, Clone)]
pub struct ForumTree {
    forums: HashMap<ForumId, Forum>,
}

impl ForumTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: ForumId) -> Option<&Forum> {
        self.forums.get(&id)
    }

    pub fn contains(&self, id: ForumId) -> bool {
        self.forums.contains_key(&id)
    }

    pub fn insert(&mut self, forum: Forum) {
        self.forums.insert(forum.id, forum);
    }

    pub fn remove(&mut self, id: ForumId) -> Option<Forum> {
        self.forums.remove(&id)
    }

    /// Direct children of a forum
    pub fn children(&self, parent: ForumId) -> Vec<&Forum> {
        self.forums
            .values()
            .filter(|f| f.parent == Some(parent))
            .collect()
    }

    pub fn has_children(&self, parent: ForumId) -> bool {
        self.forums.values().any(|f| f.parent == Some(parent))
    }

    /// Forums without a parent
    pub fn roots(&self) -> Vec<&Forum> {
        self.forums.values().filter(|f| f.parent.is_none()).collect()
    }

    /// Whether `name` is already used (case-insensitively) at the sibling
    /// level identified by `parent`, ignoring `exclude` when comparing.
    pub fn name_taken(
        &self,
        parent: Option<ForumId>,
        name: &str,
        exclude: Option<ForumId>,
    ) -> bool {
        let wanted = name.to_lowercase();
        self.forums
            .values()
            .filter(|f| f.parent == parent && Some(f.id) != exclude)
            .any(|f| f.name.to_lowercase() == wanted)
    }

    /// Whether re-parenting `moving` under `new_parent` would create a
    /// cycle. Walks upward from `new_parent` by parent references.
    pub fn would_cycle(&self, moving: ForumId, new_parent: ForumId) -> bool {
        let mut current = Some(new_parent);
        let mut visited = HashSet::new();
        while let Some(id) = current {
            if id == moving {
                return true;
            }
            if !visited.insert(id) {
                // Pre-existing cycle above the destination; refuse the move.
                return true;
            }
            current = self.get(id).and_then(|f| f.parent);
        }
        false
    }

    pub(crate) fn set_parent(&mut self, id: ForumId, parent: Option<ForumId>) {
        if let Some(forum) = self.forums.get_mut(&id) {
            forum.parent = parent;
        }
    }

    fn rename(&mut self, id: ForumId, name: Option<String>, description: Option<String>) {
        if let Some(forum) = self.forums.get_mut(&id) {
            if let Some(name) = name {
                forum.name = name;
            }
            if let Some(description) = description {
                forum.description = description;
            }
        }
    }
}

/// Manages the forum tree and its access grants.
///
/// All mutation of forums and grants goes through this type; callers that
/// need atomicity wrap it in a single lock and hold it across an operation.
#[derive(Debug, Default)]
pub struct HierarchyManager {
    tree: ForumTree,
    access: AccessResolver,
}

impl HierarchyManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tree(&self) -> &ForumTree {
        &self.tree
    }

    pub fn access(&self) -> &AccessResolver {
        &self.access
    }

    /// Whether `user` holds at least `required` on `forum`, directly or via
    /// an ancestor forum
    pub fn has_access(&self, forum: ForumId, user: UserId, required: AccessLevel) -> bool {
        self.access.has_access(&self.tree, forum, user, required)
    }

    /// Create a root forum; the creator receives an Admin grant on it.
    pub fn create_forum(
        &mut self,
        name: &str,
        description: &str,
        creator: UserId,
    ) -> Result<Forum> {
        let name = validated_name(name)?;
        if self.tree.name_taken(None, &name, None) {
            return Err(Error::Conflict(format!(
                "a root forum named '{name}' already exists"
            )));
        }

        let forum = Forum::new(name, description, None, now_secs());
        self.access.grant(forum.id, creator, AccessLevel::Admin);
        self.tree.insert(forum.clone());
        debug!(forum = %forum.id, "created root forum");
        Ok(forum)
    }

    /// Create a subforum under `parent`; requires Admin on the parent.
    pub fn create_subforum(
        &mut self,
        name: &str,
        description: &str,
        parent: ForumId,
        creator: UserId,
    ) -> Result<Forum> {
        let name = validated_name(name)?;
        if !self.tree.contains(parent) {
            return Err(Error::NotFound(format!("forum {parent}")));
        }
        if !self.has_access(parent, creator, AccessLevel::Admin) {
            return Err(Error::AccessDenied(
                "administrator access to the parent forum is required to create a subforum"
                    .to_string(),
            ));
        }
        if self.tree.name_taken(Some(parent), &name, None) {
            return Err(Error::Conflict(format!(
                "a subforum named '{name}' already exists here"
            )));
        }

        let forum = Forum::new(name, description, Some(parent), now_secs());
        self.access.grant(forum.id, creator, AccessLevel::Admin);
        self.tree.insert(forum.clone());
        debug!(forum = %forum.id, parent = %parent, "created subforum");
        Ok(forum)
    }

    /// Update name and/or description; only supplied fields are touched.
    pub fn update_forum(
        &mut self,
        id: ForumId,
        new_name: Option<&str>,
        new_description: Option<&str>,
        acting: UserId,
    ) -> Result<Forum> {
        let forum = self.forum(id)?;
        if !self.has_access(id, acting, AccessLevel::Admin) {
            return Err(Error::AccessDenied(
                "administrator access is required to update a forum".to_string(),
            ));
        }

        let name = match new_name {
            Some(candidate) if candidate != forum.name => {
                let candidate = validated_name(candidate)?;
                if self.tree.name_taken(forum.parent, &candidate, Some(id)) {
                    return Err(Error::Conflict(format!(
                        "a forum named '{candidate}' already exists at this level"
                    )));
                }
                Some(candidate)
            }
            _ => None,
        };
        let description = new_description
            .filter(|d| *d != forum.description)
            .map(str::to_string);

        self.tree.rename(id, name, description);
        self.forum(id)
    }

    /// Delete a childless forum together with all of its grants.
    pub fn delete_forum(&mut self, id: ForumId, acting: UserId) -> Result<()> {
        if !self.tree.contains(id) {
            return Err(Error::NotFound(format!("forum {id}")));
        }
        if !self.has_access(id, acting, AccessLevel::Admin) {
            return Err(Error::AccessDenied(
                "administrator access is required to delete a forum".to_string(),
            ));
        }
        if self.tree.has_children(id) {
            return Err(Error::BadRequest(
                "cannot delete a forum that still has subforums; delete or move them first"
                    .to_string(),
            ));
        }

        self.access.revoke_all(id);
        self.tree.remove(id);
        debug!(forum = %id, "deleted forum");
        Ok(())
    }

    /// Re-parent a forum; `new_parent = None` moves it to the root level.
    pub fn move_forum(
        &mut self,
        id: ForumId,
        new_parent: Option<ForumId>,
        acting: UserId,
    ) -> Result<Forum> {
        let forum = self.forum(id)?;
        if !self.has_access(id, acting, AccessLevel::Admin) {
            return Err(Error::AccessDenied(
                "administrator access is required to move a forum".to_string(),
            ));
        }

        match new_parent {
            None => {
                if self.tree.name_taken(None, &forum.name, Some(id)) {
                    return Err(Error::Conflict(format!(
                        "a root forum named '{}' already exists",
                        forum.name
                    )));
                }
            }
            Some(parent) => {
                if !self.tree.contains(parent) {
                    return Err(Error::NotFound(format!("forum {parent}")));
                }
                if !self.has_access(parent, acting, AccessLevel::Admin) {
                    return Err(Error::AccessDenied(
                        "administrator access to the destination forum is required".to_string(),
                    ));
                }
                if self.tree.name_taken(Some(parent), &forum.name, Some(id)) {
                    return Err(Error::Conflict(format!(
                        "a subforum named '{}' already exists at the destination",
                        forum.name
                    )));
                }
                if self.tree.would_cycle(id, parent) {
                    return Err(Error::BadRequest(
                        "cannot move a forum under itself or one of its descendants".to_string(),
                    ));
                }
            }
        }

        self.tree.set_parent(id, new_parent);
        debug!(forum = %id, "moved forum");
        self.forum(id)
    }

    /// Grant (or re-grant at a new level) access for `target`; requires the
    /// granter to hold Admin on the forum. Upserts, never duplicates.
    pub fn grant_access(
        &mut self,
        forum: ForumId,
        target: UserId,
        level: AccessLevel,
        granter: UserId,
    ) -> Result<()> {
        if !self.tree.contains(forum) {
            return Err(Error::NotFound(format!("forum {forum}")));
        }
        if !self.has_access(forum, granter, AccessLevel::Admin) {
            return Err(Error::AccessDenied(
                "administrator access is required to manage forum access".to_string(),
            ));
        }

        self.access.grant(forum, target, level);
        Ok(())
    }

    /// Change the level of an existing grant. Refuses to downgrade the last
    /// administrator.
    pub fn update_access(
        &mut self,
        forum: ForumId,
        target: UserId,
        level: AccessLevel,
        updater: UserId,
    ) -> Result<()> {
        if !self.tree.contains(forum) {
            return Err(Error::NotFound(format!("forum {forum}")));
        }
        if !self.has_access(forum, updater, AccessLevel::Admin) {
            return Err(Error::AccessDenied(
                "administrator access is required to manage forum access".to_string(),
            ));
        }
        if self.access.level_for(forum, target).is_none() {
            return Err(Error::NotFound(format!("access grant for user {target}")));
        }

        AdminGuard::check(&self.access, forum, target, Some(level))?;
        self.access.grant(forum, target, level);
        Ok(())
    }

    /// Remove a grant. Refuses to remove the last administrator; removing a
    /// grant that does not exist succeeds as a no-op.
    pub fn revoke_access(&mut self, forum: ForumId, target: UserId, revoker: UserId) -> Result<()> {
        if !self.tree.contains(forum) {
            return Err(Error::NotFound(format!("forum {forum}")));
        }
        if !self.has_access(forum, revoker, AccessLevel::Admin) {
            return Err(Error::AccessDenied(
                "administrator access is required to manage forum access".to_string(),
            ));
        }
        if self.access.level_for(forum, target).is_none() {
            return Ok(());
        }

        AdminGuard::check(&self.access, forum, target, None)?;
        self.access.revoke(forum, target);
        Ok(())
    }

    /// Fetch a forum by id
    pub fn forum(&self, id: ForumId) -> Result<Forum> {
        self.tree
            .get(id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("forum {id}")))
    }

    /// All root-level forums
    pub fn root_forums(&self) -> Vec<Forum> {
        self.tree.roots().into_iter().cloned().collect()
    }

    /// Direct subforums of `parent`
    pub fn subforums(&self, parent: ForumId) -> Result<Vec<Forum>> {
        if !self.tree.contains(parent) {
            return Err(Error::NotFound(format!("forum {parent}")));
        }
        Ok(self.tree.children(parent).into_iter().cloned().collect())
    }
}

fn validated_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(Error::BadRequest("forum name cannot be empty".to_string()));
    }
    Ok(trimmed.to_string())
}
