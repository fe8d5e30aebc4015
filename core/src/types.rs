//! Core types and identifiers used throughout the system

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// User identifier, supplied by the authentication layer
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Debug)]
pub struct UserId(pub Uuid);

impl UserId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Forum identifier (node in the forum tree)
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Debug)]
pub struct ForumId(pub Uuid);

impl ForumId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ForumId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ForumId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Post identifier
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Debug)]
pub struct PostId(pub Uuid);

impl PostId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Comment identifier
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Debug)]
pub struct CommentId(pub Uuid);

impl CommentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for CommentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Content (attachment) identifier
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Debug)]
pub struct ContentId(pub Uuid);

impl ContentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Access level a user can hold on a forum.
///
/// Levels are ordered Admin > Write > Read on the *same* forum: holding a
/// higher level implies every lower one. Levels also inherit downward
/// through the forum tree (a grant on an ancestor covers all descendants);
/// that part is resolved by the access resolver, not by this type.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Debug)]
pub enum AccessLevel {
    Read,
    Write,
    Admin,
}

impl AccessLevel {
    /// Whether a grant at this level satisfies a requirement of `required`
    pub fn satisfies(&self, required: AccessLevel) -> bool {
        match self {
            AccessLevel::Admin => true,
            AccessLevel::Write => matches!(required, AccessLevel::Read | AccessLevel::Write),
            AccessLevel::Read => matches!(required, AccessLevel::Read),
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, AccessLevel::Admin)
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AccessLevel::Read => "read",
            AccessLevel::Write => "write",
            AccessLevel::Admin => "admin",
        };
        write!(f, "{s}")
    }
}

/// Kind tag for an attached content item
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Debug)]
pub enum ContentType {
    Image,
    Video,
    Document,
    Audio,
}

/// What a content item is attached to: exactly one post or one comment
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Debug)]
pub enum ContentOwner {
    Post(PostId),
    Comment(CommentId),
}

/// Requested storage mode for a new content payload
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Debug)]
pub enum StorageMode {
    /// Keep the payload inline in the record
    Embedded,
    /// Hand the payload to the content store and keep only a reference
    External,
}

/// Where a content payload lives
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug)]
pub enum BlobRef {
    /// Payload kept inline in the record
    Embedded(Vec<u8>),
    /// Payload stored externally; the string is the store's reference
    External(String),
}

impl BlobRef {
    pub fn is_external(&self) -> bool {
        matches!(self, BlobRef::External(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_implication() {
        assert!(AccessLevel::Admin.satisfies(AccessLevel::Read));
        assert!(AccessLevel::Admin.satisfies(AccessLevel::Write));
        assert!(AccessLevel::Admin.satisfies(AccessLevel::Admin));

        assert!(AccessLevel::Write.satisfies(AccessLevel::Read));
        assert!(AccessLevel::Write.satisfies(AccessLevel::Write));
        assert!(!AccessLevel::Write.satisfies(AccessLevel::Admin));

        assert!(AccessLevel::Read.satisfies(AccessLevel::Read));
        assert!(!AccessLevel::Read.satisfies(AccessLevel::Write));
        assert!(!AccessLevel::Read.satisfies(AccessLevel::Admin));
    }

    #[test]
    fn test_level_ordering() {
        assert!(AccessLevel::Admin > AccessLevel::Write);
        assert!(AccessLevel::Write > AccessLevel::Read);
    }
}
