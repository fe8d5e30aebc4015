//! Public async facade over the managers
//!
//! The engine wraps the hierarchy and the board in `tokio::sync::RwLock`s
//! and exposes one method per operation. Every mutating method acquires its
//! write lock(s) once, in the fixed order hierarchy then board, and runs all
//! validation and mutation under them, so each call is a single atomic unit
//! and check-then-act sequences (the last-administrator guard in particular)
//! cannot interleave.
//!
//! Every call takes an already-authenticated acting user id; the engine only
//! consults the [`UserDirectory`] to reject unknown or deactivated accounts.

use crate::board::{Board, Comment, Content, Post};
use crate::cascade::{CascadeCoordinator, ContentUpload};
use crate::content_store::{ContentStore, DiskContentStore, MemoryContentStore};
use crate::directory::UserDirectory;
use crate::hierarchy::{Forum, HierarchyManager};
use crate::types::{
    AccessLevel, CommentId, ContentId, ContentOwner, ForumId, PostId, UserId,
};
use crate::{Error, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// Engine construction options
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Directory for externally stored content payloads. When unset, blobs
    /// are kept in memory, which suits embedding and tests.
    pub blob_dir: Option<PathBuf>,
}

/// The forum engine facade
pub struct ForumEngine {
    hierarchy: Arc<RwLock<HierarchyManager>>,
    board: Arc<RwLock<Board>>,
    directory: Arc<dyn UserDirectory>,
    coordinator: CascadeCoordinator,
}

impl ForumEngine {
    pub fn new(config: EngineConfig, directory: Arc<dyn UserDirectory>) -> Result<Self> {
        let store: Arc<dyn ContentStore> = match config.blob_dir {
            Some(dir) => Arc::new(DiskContentStore::new(dir)?),
            None => Arc::new(MemoryContentStore::new()),
        };
        Ok(Self::with_store(directory, store))
    }

    /// Build an engine around an externally provided content store
    pub fn with_store(directory: Arc<dyn UserDirectory>, store: Arc<dyn ContentStore>) -> Self {
        info!("forum engine initialized");
        Self {
            hierarchy: Arc::new(RwLock::new(HierarchyManager::new())),
            board: Arc::new(RwLock::new(Board::new())),
            directory,
            coordinator: CascadeCoordinator::new(store),
        }
    }

    /// Unknown users are NotFound, deactivated users AccessDenied. Applied
    /// to the acting user of every mutation.
    fn require_actor(&self, user: UserId) -> Result<()> {
        if !self.directory.exists(user) {
            return Err(Error::NotFound(format!("user {user}")));
        }
        if !self.directory.is_active(user) {
            return Err(Error::AccessDenied(
                "user account is deactivated".to_string(),
            ));
        }
        Ok(())
    }

    /// Grant targets must exist but need not be active
    fn require_user(&self, user: UserId) -> Result<()> {
        if !self.directory.exists(user) {
            return Err(Error::NotFound(format!("user {user}")));
        }
        Ok(())
    }

    // ---- hierarchy ----

    pub async fn create_forum(
        &self,
        name: &str,
        description: &str,
        creator: UserId,
    ) -> Result<Forum> {
        self.require_actor(creator)?;
        self.hierarchy
            .write()
            .await
            .create_forum(name, description, creator)
    }

    pub async fn create_subforum(
        &self,
        name: &str,
        description: &str,
        parent: ForumId,
        creator: UserId,
    ) -> Result<Forum> {
        self.require_actor(creator)?;
        self.hierarchy
            .write()
            .await
            .create_subforum(name, description, parent, creator)
    }

    pub async fn update_forum(
        &self,
        id: ForumId,
        new_name: Option<&str>,
        new_description: Option<&str>,
        acting: UserId,
    ) -> Result<Forum> {
        self.require_actor(acting)?;
        self.hierarchy
            .write()
            .await
            .update_forum(id, new_name, new_description, acting)
    }

    /// Delete a childless forum, its grants, and everything posted in it.
    pub async fn delete_forum(&self, id: ForumId, acting: UserId) -> Result<()> {
        self.require_actor(acting)?;
        let mut hierarchy = self.hierarchy.write().await;
        let mut board = self.board.write().await;
        hierarchy.delete_forum(id, acting)?;
        self.coordinator.purge_forum(&mut board, id);
        Ok(())
    }

    pub async fn move_forum(
        &self,
        id: ForumId,
        new_parent: Option<ForumId>,
        acting: UserId,
    ) -> Result<Forum> {
        self.require_actor(acting)?;
        self.hierarchy
            .write()
            .await
            .move_forum(id, new_parent, acting)
    }

    pub async fn grant_access(
        &self,
        forum: ForumId,
        target: UserId,
        level: AccessLevel,
        granter: UserId,
    ) -> Result<()> {
        self.require_actor(granter)?;
        self.require_user(target)?;
        self.hierarchy
            .write()
            .await
            .grant_access(forum, target, level, granter)
    }

    pub async fn update_access(
        &self,
        forum: ForumId,
        target: UserId,
        level: AccessLevel,
        updater: UserId,
    ) -> Result<()> {
        self.require_actor(updater)?;
        self.require_user(target)?;
        self.hierarchy
            .write()
            .await
            .update_access(forum, target, level, updater)
    }

    pub async fn revoke_access(
        &self,
        forum: ForumId,
        target: UserId,
        revoker: UserId,
    ) -> Result<()> {
        self.require_actor(revoker)?;
        self.hierarchy
            .write()
            .await
            .revoke_access(forum, target, revoker)
    }

    /// Whether `user` holds at least `required` on `forum`. False for
    /// unknown users and unknown forums.
    pub async fn has_access(
        &self,
        forum: ForumId,
        user: UserId,
        required: AccessLevel,
    ) -> bool {
        if !self.directory.exists(user) {
            return false;
        }
        self.hierarchy.read().await.has_access(forum, user, required)
    }

    pub async fn forum(&self, id: ForumId) -> Result<Forum> {
        self.hierarchy.read().await.forum(id)
    }

    pub async fn root_forums(&self) -> Vec<Forum> {
        self.hierarchy.read().await.root_forums()
    }

    pub async fn subforums(&self, parent: ForumId) -> Result<Vec<Forum>> {
        self.hierarchy.read().await.subforums(parent)
    }

    /// Grant rows on a forum; listing them requires Admin.
    pub async fn forum_grants(
        &self,
        forum: ForumId,
        acting: UserId,
    ) -> Result<Vec<(UserId, AccessLevel)>> {
        let hierarchy = self.hierarchy.read().await;
        hierarchy.forum(forum)?;
        if !hierarchy.has_access(forum, acting, AccessLevel::Admin) {
            return Err(Error::AccessDenied(
                "administrator access is required to list forum grants".to_string(),
            ));
        }
        Ok(hierarchy.access().grants_for_forum(forum))
    }

    /// Forums on which the user holds a direct grant
    pub async fn user_grants(&self, user: UserId) -> Vec<(ForumId, AccessLevel)> {
        self.hierarchy.read().await.access().forums_for_user(user)
    }

    // ---- board ----

    pub async fn create_post(
        &self,
        forum: ForumId,
        title: &str,
        body: &str,
        author: UserId,
    ) -> Result<Post> {
        self.require_actor(author)?;
        let hierarchy = self.hierarchy.read().await;
        let mut board = self.board.write().await;
        hierarchy.forum(forum)?;
        if !hierarchy.has_access(forum, author, AccessLevel::Write) {
            return Err(Error::AccessDenied(
                "write access is required to post in this forum".to_string(),
            ));
        }
        board.create_post(forum, author, title, body)
    }

    pub async fn create_comment(
        &self,
        post: PostId,
        body: &str,
        author: UserId,
    ) -> Result<Comment> {
        self.require_actor(author)?;
        let hierarchy = self.hierarchy.read().await;
        let mut board = self.board.write().await;
        let forum = board.post(post)?.forum;
        if !hierarchy.has_access(forum, author, AccessLevel::Write) {
            return Err(Error::AccessDenied(
                "write access is required to comment in this forum".to_string(),
            ));
        }
        board.create_comment(post, author, body)
    }

    pub async fn create_reply(
        &self,
        parent: CommentId,
        body: &str,
        author: UserId,
    ) -> Result<Comment> {
        self.require_actor(author)?;
        let hierarchy = self.hierarchy.read().await;
        let mut board = self.board.write().await;
        let post = board.comment(parent)?.post;
        let forum = board.post(post)?.forum;
        if !hierarchy.has_access(forum, author, AccessLevel::Write) {
            return Err(Error::AccessDenied(
                "write access is required to comment in this forum".to_string(),
            ));
        }
        board.create_reply(parent, author, body)
    }

    pub async fn update_post(
        &self,
        id: PostId,
        new_title: Option<&str>,
        new_body: Option<&str>,
        acting: UserId,
    ) -> Result<Post> {
        self.require_actor(acting)?;
        let hierarchy = self.hierarchy.read().await;
        let mut board = self.board.write().await;
        let post = board.post(id)?;
        if acting != post.author && !hierarchy.has_access(post.forum, acting, AccessLevel::Admin) {
            return Err(Error::AccessDenied(
                "only the author or an administrator can edit a post".to_string(),
            ));
        }
        board.update_post(id, new_title, new_body)
    }

    pub async fn update_comment(
        &self,
        id: CommentId,
        new_body: &str,
        acting: UserId,
    ) -> Result<Comment> {
        self.require_actor(acting)?;
        let hierarchy = self.hierarchy.read().await;
        let mut board = self.board.write().await;
        let comment = board.comment(id)?;
        let forum = board.post(comment.post)?.forum;
        if acting != comment.author && !hierarchy.has_access(forum, acting, AccessLevel::Admin) {
            return Err(Error::AccessDenied(
                "only the author or an administrator can edit a comment".to_string(),
            ));
        }
        board.update_comment(id, new_body)
    }

    pub async fn post(&self, id: PostId, acting: UserId) -> Result<Post> {
        let hierarchy = self.hierarchy.read().await;
        let board = self.board.read().await;
        let post = board.post(id)?.clone();
        self.require_read(&hierarchy, post.forum, acting)?;
        Ok(post)
    }

    pub async fn comment(&self, id: CommentId, acting: UserId) -> Result<Comment> {
        let hierarchy = self.hierarchy.read().await;
        let board = self.board.read().await;
        let comment = board.comment(id)?.clone();
        let forum = board.post(comment.post)?.forum;
        self.require_read(&hierarchy, forum, acting)?;
        Ok(comment)
    }

    pub async fn posts_in_forum(&self, forum: ForumId, acting: UserId) -> Result<Vec<Post>> {
        let hierarchy = self.hierarchy.read().await;
        let board = self.board.read().await;
        hierarchy.forum(forum)?;
        self.require_read(&hierarchy, forum, acting)?;
        Ok(board.posts_in_forum(forum))
    }

    /// Top-level comments on a post, in creation order
    pub async fn comments_on_post(&self, post: PostId, acting: UserId) -> Result<Vec<Comment>> {
        let hierarchy = self.hierarchy.read().await;
        let board = self.board.read().await;
        let forum = board.post(post)?.forum;
        self.require_read(&hierarchy, forum, acting)?;
        Ok(board.top_level_comments(post))
    }

    /// Direct replies to a comment, in creation order
    pub async fn replies_to(&self, comment: CommentId, acting: UserId) -> Result<Vec<Comment>> {
        let hierarchy = self.hierarchy.read().await;
        let board = self.board.read().await;
        let post = board.comment(comment)?.post;
        let forum = board.post(post)?.forum;
        self.require_read(&hierarchy, forum, acting)?;
        Ok(board.replies(comment))
    }

    /// Content records attached to a post or comment
    pub async fn contents(&self, owner: ContentOwner, acting: UserId) -> Result<Vec<Content>> {
        let hierarchy = self.hierarchy.read().await;
        let board = self.board.read().await;
        let forum = match owner {
            ContentOwner::Post(post) => board.post(post)?.forum,
            ContentOwner::Comment(comment) => {
                let post = board.comment(comment)?.post;
                board.post(post)?.forum
            }
        };
        self.require_read(&hierarchy, forum, acting)?;
        Ok(board.contents_for(owner))
    }

    // ---- cascade / content ----

    pub async fn delete_comment(&self, id: CommentId, acting: UserId) -> Result<usize> {
        self.require_actor(acting)?;
        let hierarchy = self.hierarchy.read().await;
        let mut board = self.board.write().await;
        self.coordinator
            .delete_comment(&mut board, &hierarchy, id, acting)
    }

    pub async fn delete_post(&self, id: PostId, acting: UserId) -> Result<()> {
        self.require_actor(acting)?;
        let hierarchy = self.hierarchy.read().await;
        let mut board = self.board.write().await;
        self.coordinator.delete_post(&mut board, &hierarchy, id, acting)
    }

    pub async fn add_content(
        &self,
        owner: ContentOwner,
        upload: ContentUpload,
        acting: UserId,
    ) -> Result<Content> {
        self.require_actor(acting)?;
        let hierarchy = self.hierarchy.read().await;
        let mut board = self.board.write().await;
        self.coordinator
            .add_content(&mut board, &hierarchy, owner, acting, upload)
    }

    pub async fn delete_content(&self, id: ContentId, acting: UserId) -> Result<()> {
        self.require_actor(acting)?;
        let hierarchy = self.hierarchy.read().await;
        let mut board = self.board.write().await;
        self.coordinator
            .delete_content(&mut board, &hierarchy, id, acting)
    }

    /// Payload bytes of a content item
    pub async fn content_bytes(&self, id: ContentId, acting: UserId) -> Result<Vec<u8>> {
        let hierarchy = self.hierarchy.read().await;
        let board = self.board.read().await;
        self.coordinator
            .content_bytes(&board, &hierarchy, id, acting)
    }

    fn require_read(
        &self,
        hierarchy: &HierarchyManager,
        forum: ForumId,
        acting: UserId,
    ) -> Result<()> {
        if !self.directory.exists(acting)
            || !hierarchy.has_access(forum, acting, AccessLevel::Read)
        {
            return Err(Error::AccessDenied(
                "read access to this forum is required".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::StaticDirectory;

    fn engine_with_users(count: usize) -> (ForumEngine, Vec<UserId>) {
        let mut directory = StaticDirectory::new();
        let users = (0..count).map(|_| directory.add_user()).collect();
        let engine = ForumEngine::new(EngineConfig::default(), Arc::new(directory))
            .expect("in-memory engine");
        (engine, users)
    }

    #[tokio::test]
    async fn test_unknown_actor_is_not_found() {
        let (engine, _) = engine_with_users(0);
        let err = engine
            .create_forum("General", "", UserId::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_deactivated_actor_is_denied() {
        let mut directory = StaticDirectory::new();
        let alice = directory.add_user();
        directory.deactivate(alice);
        let engine =
            ForumEngine::new(EngineConfig::default(), Arc::new(directory)).expect("engine");

        let err = engine.create_forum("General", "", alice).await.unwrap_err();
        assert!(matches!(err, Error::AccessDenied(_)));
    }

    #[tokio::test]
    async fn test_has_access_false_for_unknown_user() {
        let (engine, users) = engine_with_users(1);
        let forum = engine.create_forum("General", "", users[0]).await.unwrap();
        assert!(!engine
            .has_access(forum.id, UserId::new(), AccessLevel::Read)
            .await);
    }

    #[tokio::test]
    async fn test_grant_target_must_exist() {
        let (engine, users) = engine_with_users(1);
        let forum = engine.create_forum("General", "", users[0]).await.unwrap();

        let err = engine
            .grant_access(forum.id, UserId::new(), AccessLevel::Read, users[0])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_forum_purges_posts() {
        let (engine, users) = engine_with_users(1);
        let admin = users[0];
        let forum = engine.create_forum("General", "", admin).await.unwrap();
        let post = engine
            .create_post(forum.id, "t", "b", admin)
            .await
            .unwrap();

        engine.delete_forum(forum.id, admin).await.unwrap();
        assert!(engine.forum(forum.id).await.is_err());
        let err = engine.post(post.id, admin).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
