//! Cascading deletion and content lifecycle
//!
//! Deleting a comment takes its whole reply tree and every attached content
//! item in one unit; deleting a post takes all of its comments and content.
//! Traversal uses an explicit worklist, never recursion, so arbitrarily deep
//! reply chains cannot exhaust the stack. Authorization for a comment
//! cascade is established for every node before the first record is removed.
//!
//! Blob cleanup is best effort: a store that fails to delete a payload is
//! logged and the record deletion still completes. Storing and fetching,
//! by contrast, propagate storage errors to the caller.

use crate::board::{Board, Content};
use crate::content_store::ContentStore;
use crate::hierarchy::HierarchyManager;
use crate::types::{
    AccessLevel, BlobRef, CommentId, ContentId, ContentOwner, ContentType, ForumId, PostId,
    StorageMode, UserId,
};
use crate::{Error, Result};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// A new content payload together with its metadata
#[derive(Debug, Clone)]
pub struct ContentUpload {
    pub filename: String,
    pub description: String,
    pub content_type: ContentType,
    pub mode: StorageMode,
    pub data: Vec<u8>,
}

/// Runs cascade deletions and mediates between records and blob storage
pub struct CascadeCoordinator {
    store: Arc<dyn ContentStore>,
}

impl CascadeCoordinator {
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self { store }
    }

    /// Attach content to a post or comment. Requires the acting user to be
    /// the owning record's author or to hold Write on the forum.
    pub fn add_content(
        &self,
        board: &mut Board,
        hierarchy: &HierarchyManager,
        owner: ContentOwner,
        acting: UserId,
        upload: ContentUpload,
    ) -> Result<Content> {
        if upload.data.is_empty() {
            return Err(Error::BadRequest(
                "content payload cannot be empty".to_string(),
            ));
        }

        let (forum, author) = owner_info(board, owner)?;
        if acting != author && !hierarchy.has_access(forum, acting, AccessLevel::Write) {
            return Err(Error::AccessDenied(
                "write access is required to attach content".to_string(),
            ));
        }

        let blob = match upload.mode {
            StorageMode::Embedded => BlobRef::Embedded(upload.data),
            StorageMode::External => {
                let name = unique_blob_name(&upload.filename);
                self.store.store(&name, &upload.data)?;
                BlobRef::External(name)
            }
        };

        board.attach_content(
            owner,
            acting,
            &upload.filename,
            &upload.description,
            upload.content_type,
            blob,
        )
    }

    /// Retrieve the payload bytes of a content item. Requires Read on the
    /// forum; fetch failures from the store propagate.
    pub fn content_bytes(
        &self,
        board: &Board,
        hierarchy: &HierarchyManager,
        id: ContentId,
        acting: UserId,
    ) -> Result<Vec<u8>> {
        let content = board.content(id)?;
        let (forum, _) = owner_info(board, content.owner)?;
        if !hierarchy.has_access(forum, acting, AccessLevel::Read) {
            return Err(Error::AccessDenied(
                "read access is required to fetch content".to_string(),
            ));
        }

        match &content.blob {
            BlobRef::Embedded(bytes) => Ok(bytes.clone()),
            BlobRef::External(name) => self.store.fetch(name),
        }
    }

    /// Delete a single content item. Requires the acting user to be the
    /// owning record's author, the uploader, or a forum administrator.
    pub fn delete_content(
        &self,
        board: &mut Board,
        hierarchy: &HierarchyManager,
        id: ContentId,
        acting: UserId,
    ) -> Result<()> {
        let uploader = board.content(id)?.uploader;
        let (forum, author) = owner_info(board, board.content(id)?.owner)?;
        if acting != author
            && acting != uploader
            && !hierarchy.has_access(forum, acting, AccessLevel::Admin)
        {
            return Err(Error::AccessDenied(
                "only the author or an administrator can delete content".to_string(),
            ));
        }

        if let Some(content) = board.remove_content(id) {
            self.cleanup_blob(&content);
        }
        Ok(())
    }

    /// Delete a comment together with its entire reply tree and all content
    /// attached anywhere in that tree. The acting user must pass the
    /// author-or-post-author-or-admin check for every comment in the tree;
    /// nothing is removed if any node fails. Returns the number of comments
    /// deleted.
    pub fn delete_comment(
        &self,
        board: &mut Board,
        hierarchy: &HierarchyManager,
        id: CommentId,
        acting: UserId,
    ) -> Result<usize> {
        let root = board.comment(id)?;
        let post = board.post(root.post)?.clone();
        let forum = post.forum;
        let is_admin = hierarchy.has_access(forum, acting, AccessLevel::Admin);

        let order = collect_reply_tree(board, [id]);
        for comment_id in &order {
            let comment = board.comment(*comment_id)?;
            if acting != comment.author && acting != post.author && !is_admin {
                return Err(Error::AccessDenied(
                    "deleting a comment requires being its author, the post's author, \
                     or a forum administrator"
                        .to_string(),
                ));
            }
        }

        self.remove_comments(board, &order);
        debug!(comment = %id, deleted = order.len(), "cascade-deleted comment tree");
        Ok(order.len())
    }

    /// Delete a post together with every comment on it and all attached
    /// content. The acting user must be the post's author or a forum
    /// administrator; that authority covers the post's dependents, so
    /// per-comment checks are not repeated here.
    pub fn delete_post(
        &self,
        board: &mut Board,
        hierarchy: &HierarchyManager,
        id: PostId,
        acting: UserId,
    ) -> Result<()> {
        let post = board.post(id)?.clone();
        if acting != post.author && !hierarchy.has_access(post.forum, acting, AccessLevel::Admin) {
            return Err(Error::AccessDenied(
                "deleting a post requires being its author or a forum administrator".to_string(),
            ));
        }

        let order = collect_reply_tree(board, board.top_level_comment_ids(id));
        self.remove_comments(board, &order);

        for content in board.contents_for(ContentOwner::Post(id)) {
            board.remove_content(content.id);
            self.cleanup_blob(&content);
        }
        board.remove_post(id);
        debug!(post = %id, comments = order.len(), "cascade-deleted post");
        Ok(())
    }

    /// Remove every post in a forum, cascading as `delete_post` does.
    /// Authorization for the forum deletion itself is the caller's concern.
    pub fn purge_forum(&self, board: &mut Board, forum: ForumId) {
        for post_id in board.post_ids_in_forum(forum) {
            let order = collect_reply_tree(board, board.top_level_comment_ids(post_id));
            self.remove_comments(board, &order);
            for content in board.contents_for(ContentOwner::Post(post_id)) {
                board.remove_content(content.id);
                self.cleanup_blob(&content);
            }
            board.remove_post(post_id);
        }
    }

    /// Delete the listed comments leaves-first, taking their content along.
    fn remove_comments(&self, board: &mut Board, order: &[CommentId]) {
        for comment_id in order.iter().rev() {
            for content in board.contents_for(ContentOwner::Comment(*comment_id)) {
                board.remove_content(content.id);
                self.cleanup_blob(&content);
            }
            board.remove_comment(*comment_id);
        }
    }

    fn cleanup_blob(&self, content: &Content) {
        if let BlobRef::External(name) = &content.blob {
            if let Err(error) = self.store.delete(name) {
                warn!(content = %content.id, %error, "blob deletion failed; record removed anyway");
            }
        }
    }
}

/// Breadth-first expansion of the given roots over reply edges. The returned
/// order lists parents before their replies.
fn collect_reply_tree(board: &Board, roots: impl IntoIterator<Item = CommentId>) -> Vec<CommentId> {
    let mut order = Vec::new();
    let mut queue: VecDeque<CommentId> = roots.into_iter().collect();
    while let Some(id) = queue.pop_front() {
        order.push(id);
        queue.extend(board.reply_ids(id));
    }
    order
}

/// Forum and record author for a content owner
fn owner_info(board: &Board, owner: ContentOwner) -> Result<(ForumId, UserId)> {
    match owner {
        ContentOwner::Post(post) => {
            let post = board.post(post)?;
            Ok((post.forum, post.author))
        }
        ContentOwner::Comment(comment) => {
            let comment = board.comment(comment)?;
            let post = board.post(comment.post)?;
            Ok((post.forum, comment.author))
        }
    }
}

/// Unique store name preserving the original extension
fn unique_blob_name(filename: &str) -> String {
    match std::path::Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
    {
        Some(ext) if !ext.is_empty() => format!("{}.{ext}", Uuid::new_v4()),
        _ => Uuid::new_v4().to_string(),
    }
}
