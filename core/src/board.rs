//! Post, comment, and content records
//!
//! The board is plain storage with secondary indexes; authorization and
//! cascade ordering are decided by the callers that hold it. Indexes are
//! kept strictly in sync with the record maps by routing every mutation
//! through this module.

use crate::types::{
    BlobRef, CommentId, ContentId, ContentOwner, ContentType, ForumId, PostId, UserId,
};
use crate::{now_secs, Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A top-level post inside a forum
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub forum: ForumId,
    pub author: UserId,
    pub title: String,
    pub body: String,
    pub created_at: u64,
    pub updated_at: u64,
}

/// A comment on a post, optionally replying to another comment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub post: PostId,
    /// Parent comment when this is a reply, None for a top-level comment
    pub parent: Option<CommentId>,
    pub author: UserId,
    pub body: String,
    pub created_at: u64,
    pub updated_at: u64,
}

/// A content item attached to exactly one post or comment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Content {
    pub id: ContentId,
    pub owner: ContentOwner,
    pub uploader: UserId,
    /// Original file name as supplied by the uploader
    pub filename: String,
    pub description: String,
    pub content_type: ContentType,
    pub blob: BlobRef,
    pub created_at: u64,
}

/// Record maps plus the indexes that make listing and cascade walks cheap
#[derive(Debug, Default)]
pub struct Board {
    posts: HashMap<PostId, Post>,
    comments: HashMap<CommentId, Comment>,
    contents: HashMap<ContentId, Content>,

    forum_posts: HashMap<ForumId, Vec<PostId>>,
    post_comments: HashMap<PostId, Vec<CommentId>>,
    comment_replies: HashMap<CommentId, Vec<CommentId>>,
    post_contents: HashMap<PostId, Vec<ContentId>>,
    comment_contents: HashMap<CommentId, Vec<ContentId>>,
}

impl Board {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_post(
        &mut self,
        forum: ForumId,
        author: UserId,
        title: &str,
        body: &str,
    ) -> Result<Post> {
        let title = title.trim();
        if title.is_empty() {
            return Err(Error::BadRequest("post title cannot be empty".to_string()));
        }
        if body.trim().is_empty() {
            return Err(Error::BadRequest("post body cannot be empty".to_string()));
        }

        let now = now_secs();
        let post = Post {
            id: PostId::new(),
            forum,
            author,
            title: title.to_string(),
            body: body.to_string(),
            created_at: now,
            updated_at: now,
        };
        self.forum_posts.entry(forum).or_default().push(post.id);
        self.posts.insert(post.id, post.clone());
        Ok(post)
    }

    pub fn create_comment(&mut self, post: PostId, author: UserId, body: &str) -> Result<Comment> {
        self.insert_comment(post, None, author, body)
    }

    /// Reply to an existing comment; the reply lands on the same post.
    pub fn create_reply(
        &mut self,
        parent: CommentId,
        author: UserId,
        body: &str,
    ) -> Result<Comment> {
        let post = self.comment(parent)?.post;
        self.insert_comment(post, Some(parent), author, body)
    }

    fn insert_comment(
        &mut self,
        post: PostId,
        parent: Option<CommentId>,
        author: UserId,
        body: &str,
    ) -> Result<Comment> {
        if body.trim().is_empty() {
            return Err(Error::BadRequest("comment body cannot be empty".to_string()));
        }

        let now = now_secs();
        let comment = Comment {
            id: CommentId::new(),
            post,
            parent,
            author,
            body: body.to_string(),
            created_at: now,
            updated_at: now,
        };
        match parent {
            Some(parent) => self
                .comment_replies
                .entry(parent)
                .or_default()
                .push(comment.id),
            None => self.post_comments.entry(post).or_default().push(comment.id),
        }
        self.comments.insert(comment.id, comment.clone());
        Ok(comment)
    }

    pub fn update_post(
        &mut self,
        id: PostId,
        new_title: Option<&str>,
        new_body: Option<&str>,
    ) -> Result<Post> {
        if !self.posts.contains_key(&id) {
            return Err(Error::NotFound(format!("post {id}")));
        }
        if let Some(title) = new_title {
            if title.trim().is_empty() {
                return Err(Error::BadRequest("post title cannot be empty".to_string()));
            }
        }
        if let Some(body) = new_body {
            if body.trim().is_empty() {
                return Err(Error::BadRequest("post body cannot be empty".to_string()));
            }
        }

        let post = self.posts.get_mut(&id).ok_or_else(|| Error::NotFound(format!("post {id}")))?;
        if let Some(title) = new_title {
            post.title = title.trim().to_string();
        }
        if let Some(body) = new_body {
            post.body = body.to_string();
        }
        post.updated_at = now_secs();
        Ok(post.clone())
    }

    pub fn update_comment(&mut self, id: CommentId, new_body: &str) -> Result<Comment> {
        if new_body.trim().is_empty() {
            return Err(Error::BadRequest("comment body cannot be empty".to_string()));
        }
        let comment = self
            .comments
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("comment {id}")))?;
        comment.body = new_body.to_string();
        comment.updated_at = now_secs();
        Ok(comment.clone())
    }

    pub fn attach_content(
        &mut self,
        owner: ContentOwner,
        uploader: UserId,
        filename: &str,
        description: &str,
        content_type: ContentType,
        blob: BlobRef,
    ) -> Result<Content> {
        match owner {
            ContentOwner::Post(post) => {
                if !self.posts.contains_key(&post) {
                    return Err(Error::NotFound(format!("post {post}")));
                }
            }
            ContentOwner::Comment(comment) => {
                if !self.comments.contains_key(&comment) {
                    return Err(Error::NotFound(format!("comment {comment}")));
                }
            }
        }

        let content = Content {
            id: ContentId::new(),
            owner,
            uploader,
            filename: filename.to_string(),
            description: description.to_string(),
            content_type,
            blob,
            created_at: now_secs(),
        };
        match owner {
            ContentOwner::Post(post) => {
                self.post_contents.entry(post).or_default().push(content.id)
            }
            ContentOwner::Comment(comment) => self
                .comment_contents
                .entry(comment)
                .or_default()
                .push(content.id),
        }
        self.contents.insert(content.id, content.clone());
        Ok(content)
    }

    pub fn post(&self, id: PostId) -> Result<&Post> {
        self.posts
            .get(&id)
            .ok_or_else(|| Error::NotFound(format!("post {id}")))
    }

    pub fn comment(&self, id: CommentId) -> Result<&Comment> {
        self.comments
            .get(&id)
            .ok_or_else(|| Error::NotFound(format!("comment {id}")))
    }

    pub fn content(&self, id: ContentId) -> Result<&Content> {
        self.contents
            .get(&id)
            .ok_or_else(|| Error::NotFound(format!("content {id}")))
    }

    /// Post ids in a forum, in creation order
    pub fn post_ids_in_forum(&self, forum: ForumId) -> Vec<PostId> {
        self.forum_posts.get(&forum).cloned().unwrap_or_default()
    }

    pub fn posts_in_forum(&self, forum: ForumId) -> Vec<Post> {
        self.post_ids_in_forum(forum)
            .iter()
            .filter_map(|id| self.posts.get(id).cloned())
            .collect()
    }

    /// Top-level comments on a post, in creation order
    pub fn top_level_comments(&self, post: PostId) -> Vec<Comment> {
        self.post_comments
            .get(&post)
            .into_iter()
            .flatten()
            .filter_map(|id| self.comments.get(id).cloned())
            .collect()
    }

    /// Direct replies to a comment, in creation order
    pub fn reply_ids(&self, comment: CommentId) -> Vec<CommentId> {
        self.comment_replies.get(&comment).cloned().unwrap_or_default()
    }

    pub fn replies(&self, comment: CommentId) -> Vec<Comment> {
        self.reply_ids(comment)
            .iter()
            .filter_map(|id| self.comments.get(id).cloned())
            .collect()
    }

    /// Top-level comment ids on a post
    pub fn top_level_comment_ids(&self, post: PostId) -> Vec<CommentId> {
        self.post_comments.get(&post).cloned().unwrap_or_default()
    }

    pub fn content_ids_for(&self, owner: ContentOwner) -> Vec<ContentId> {
        match owner {
            ContentOwner::Post(post) => self.post_contents.get(&post).cloned().unwrap_or_default(),
            ContentOwner::Comment(comment) => self
                .comment_contents
                .get(&comment)
                .cloned()
                .unwrap_or_default(),
        }
    }

    pub fn contents_for(&self, owner: ContentOwner) -> Vec<Content> {
        self.content_ids_for(owner)
            .iter()
            .filter_map(|id| self.contents.get(id).cloned())
            .collect()
    }

    /// Remove a single comment record together with its index entries.
    /// Replies and attached content are the cascade coordinator's business
    /// and must already be gone.
    pub fn remove_comment(&mut self, id: CommentId) -> Option<Comment> {
        let comment = self.comments.remove(&id)?;
        match comment.parent {
            Some(parent) => {
                if let Some(siblings) = self.comment_replies.get_mut(&parent) {
                    siblings.retain(|c| *c != id);
                }
            }
            None => {
                if let Some(siblings) = self.post_comments.get_mut(&comment.post) {
                    siblings.retain(|c| *c != id);
                }
            }
        }
        self.comment_replies.remove(&id);
        self.comment_contents.remove(&id);
        Some(comment)
    }

    /// Remove a post record together with its index entries. Comments and
    /// attached content must already be gone.
    pub fn remove_post(&mut self, id: PostId) -> Option<Post> {
        let post = self.posts.remove(&id)?;
        if let Some(siblings) = self.forum_posts.get_mut(&post.forum) {
            siblings.retain(|p| *p != id);
        }
        self.post_comments.remove(&id);
        self.post_contents.remove(&id);
        Some(post)
    }

    /// Remove a content record together with its index entry
    pub fn remove_content(&mut self, id: ContentId) -> Option<Content> {
        let content = self.contents.remove(&id)?;
        match content.owner {
            ContentOwner::Post(post) => {
                if let Some(siblings) = self.post_contents.get_mut(&post) {
                    siblings.retain(|c| *c != id);
                }
            }
            ContentOwner::Comment(comment) => {
                if let Some(siblings) = self.comment_contents.get_mut(&comment) {
                    siblings.retain(|c| *c != id);
                }
            }
        }
        Some(content)
    }
}
