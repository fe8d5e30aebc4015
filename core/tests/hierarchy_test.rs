//! Forum tree mutation invariants, exercised via the engine

use arbor_core::directory::StaticDirectory;
use arbor_core::{EngineConfig, Error, ForumEngine, UserId};
use std::sync::Arc;

fn engine_with_users(count: usize) -> (ForumEngine, Vec<UserId>) {
    let mut directory = StaticDirectory::new();
    let users = (0..count).map(|_| directory.add_user()).collect();
    let engine =
        ForumEngine::new(EngineConfig::default(), Arc::new(directory)).expect("in-memory engine");
    (engine, users)
}

#[tokio::test]
async fn test_duplicate_names_rejected_per_level() {
    let (engine, users) = engine_with_users(1);
    let admin = users[0];

    let root = engine.create_forum("Tech", "", admin).await.unwrap();
    let err = engine.create_forum("TECH", "", admin).await.unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));

    engine
        .create_subforum("Rust", "", root.id, admin)
        .await
        .unwrap();
    let err = engine
        .create_subforum("rust", "", root.id, admin)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));

    // Same name one level deeper is fine.
    let other = engine.create_forum("Other", "", admin).await.unwrap();
    assert!(engine
        .create_subforum("Rust", "", other.id, admin)
        .await
        .is_ok());
}

#[tokio::test]
async fn test_delete_forum_requires_no_children() {
    let (engine, users) = engine_with_users(1);
    let admin = users[0];

    let root = engine.create_forum("Tech", "", admin).await.unwrap();
    let sub = engine
        .create_subforum("Rust", "", root.id, admin)
        .await
        .unwrap();

    let err = engine.delete_forum(root.id, admin).await.unwrap_err();
    assert!(matches!(err, Error::BadRequest(_)));

    engine.delete_forum(sub.id, admin).await.unwrap();
    engine.delete_forum(root.id, admin).await.unwrap();
    assert!(engine.forum(root.id).await.is_err());
}

#[tokio::test]
async fn test_move_forum_rejects_cycles() {
    let (engine, users) = engine_with_users(1);
    let admin = users[0];

    let a = engine.create_forum("A", "", admin).await.unwrap();
    let b = engine.create_subforum("B", "", a.id, admin).await.unwrap();
    let c = engine.create_subforum("C", "", b.id, admin).await.unwrap();

    for target in [a.id, c.id] {
        let err = engine.move_forum(a.id, Some(target), admin).await.unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));
    }

    // The tree is untouched after the rejected moves.
    assert_eq!(engine.forum(a.id).await.unwrap().parent, None);
    assert_eq!(engine.forum(c.id).await.unwrap().parent, Some(b.id));
}

#[tokio::test]
async fn test_move_forum_to_new_parent_and_root() {
    let (engine, users) = engine_with_users(1);
    let admin = users[0];

    let a = engine.create_forum("A", "", admin).await.unwrap();
    let b = engine.create_forum("B", "", admin).await.unwrap();
    let sub = engine.create_subforum("Sub", "", a.id, admin).await.unwrap();

    let moved = engine.move_forum(sub.id, Some(b.id), admin).await.unwrap();
    assert_eq!(moved.parent, Some(b.id));
    assert_eq!(engine.subforums(a.id).await.unwrap().len(), 0);
    assert_eq!(engine.subforums(b.id).await.unwrap().len(), 1);

    let moved = engine.move_forum(sub.id, None, admin).await.unwrap();
    assert_eq!(moved.parent, None);
    assert_eq!(engine.root_forums().await.len(), 3);
}

#[tokio::test]
async fn test_move_checks_destination_names() {
    let (engine, users) = engine_with_users(1);
    let admin = users[0];

    let a = engine.create_forum("A", "", admin).await.unwrap();
    let b = engine.create_forum("B", "", admin).await.unwrap();
    engine.create_subforum("Dup", "", a.id, admin).await.unwrap();
    let clash = engine.create_subforum("dup", "", b.id, admin).await.unwrap();

    let err = engine
        .move_forum(clash.id, Some(a.id), admin)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));
}

#[tokio::test]
async fn test_update_forum_rename_and_describe() {
    let (engine, users) = engine_with_users(2);
    let (admin, stranger) = (users[0], users[1]);
    let forum = engine.create_forum("Old", "before", admin).await.unwrap();

    let err = engine
        .update_forum(forum.id, Some("New"), None, stranger)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::AccessDenied(_)));

    let updated = engine
        .update_forum(forum.id, Some("New"), Some("after"), admin)
        .await
        .unwrap();
    assert_eq!(updated.name, "New");
    assert_eq!(updated.description, "after");
}

#[tokio::test]
async fn test_empty_forum_name_rejected() {
    let (engine, users) = engine_with_users(1);
    let err = engine.create_forum("  ", "", users[0]).await.unwrap_err();
    assert!(matches!(err, Error::BadRequest(_)));
}
