//! User directory collaborator
//!
//! The engine never authenticates anyone; it only asks an external directory
//! whether a user identifier exists and whether the account is active.

use crate::types::UserId;
use std::collections::HashMap;

/// Lookup interface for user accounts
pub trait UserDirectory: Send + Sync {
    /// Whether the user exists at all
    fn exists(&self, user: UserId) -> bool;

    /// Whether the user exists and is allowed to act
    fn is_active(&self, user: UserId) -> bool;
}

/// In-memory directory for embedding and tests
#[derive(Debug, Default, Clone)]
pub struct StaticDirectory {
    users: HashMap<UserId, bool>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an active user and return its id
    pub fn add_user(&mut self) -> UserId {
        let id = UserId::new();
        self.users.insert(id, true);
        id
    }

    pub fn insert(&mut self, user: UserId, active: bool) {
        self.users.insert(user, active);
    }

    pub fn deactivate(&mut self, user: UserId) {
        if let Some(active) = self.users.get_mut(&user) {
            *active = false;
        }
    }
}

impl UserDirectory for StaticDirectory {
    fn exists(&self, user: UserId) -> bool {
        self.users.contains_key(&user)
    }

    fn is_active(&self, user: UserId) -> bool {
        self.users.get(&user).copied().unwrap_or(false)
    }
}
