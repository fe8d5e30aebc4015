//! Arbor Core Library
//!
//! Backend engine for a hierarchical discussion forum: a tree of forums with
//! inherited access levels, posts, threaded comments, and attached content.
//! The library covers permission resolution over the forum tree, tree
//! mutation under uniqueness/acyclicity invariants, last-administrator
//! protection, and cascading deletion of comments, posts, and content.
//!
//! Transport, authentication, and UI layers live outside this crate; every
//! operation takes an already-authenticated acting user identifier.

pub mod access;
pub mod board;
pub mod cascade;
pub mod content_store;
pub mod directory;
pub mod engine;
pub mod hierarchy;
pub mod types;

pub use board::{Comment, Content, Post};
pub use cascade::ContentUpload;
pub use engine::{EngineConfig, ForumEngine};
pub use hierarchy::Forum;
pub use types::*;

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0} not found")]
    NotFound(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Storage operation failed: {0}")]
    Storage(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Seconds since the Unix epoch. Clamped to zero on clock skew.
pub(crate) fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
