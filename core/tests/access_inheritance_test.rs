//! Access resolution through the forum tree, exercised via the engine

use arbor_core::{AccessLevel, EngineConfig, ForumEngine, UserId};
use arbor_core::directory::StaticDirectory;
use std::sync::Arc;

fn engine_with_users(count: usize) -> (ForumEngine, Vec<UserId>) {
    let mut directory = StaticDirectory::new();
    let users = (0..count).map(|_| directory.add_user()).collect();
    let engine =
        ForumEngine::new(EngineConfig::default(), Arc::new(directory)).expect("in-memory engine");
    (engine, users)
}

#[tokio::test]
async fn test_grant_on_ancestor_covers_deep_descendants() {
    let (engine, users) = engine_with_users(2);
    let (admin, reader) = (users[0], users[1]);

    let root = engine.create_forum("Root", "", admin).await.unwrap();
    let mut parent = root.id;
    let mut leaf = root.id;
    for i in 0..5 {
        let sub = engine
            .create_subforum(&format!("Sub {i}"), "", parent, admin)
            .await
            .unwrap();
        leaf = sub.id;
        parent = sub.id;
    }

    engine
        .grant_access(root.id, reader, AccessLevel::Read, admin)
        .await
        .unwrap();

    assert!(engine.has_access(leaf, reader, AccessLevel::Read).await);
    assert!(!engine.has_access(leaf, reader, AccessLevel::Write).await);
    // The creator's Admin grant on the root covers the whole chain.
    assert!(engine.has_access(leaf, admin, AccessLevel::Admin).await);
}

#[tokio::test]
async fn test_access_does_not_flow_upward() {
    let (engine, users) = engine_with_users(2);
    let (admin, writer) = (users[0], users[1]);

    let root = engine.create_forum("Root", "", admin).await.unwrap();
    let sub = engine
        .create_subforum("Sub", "", root.id, admin)
        .await
        .unwrap();
    engine
        .grant_access(sub.id, writer, AccessLevel::Write, admin)
        .await
        .unwrap();

    assert!(engine.has_access(sub.id, writer, AccessLevel::Write).await);
    assert!(!engine.has_access(root.id, writer, AccessLevel::Read).await);
}

#[tokio::test]
async fn test_write_implies_read_but_not_admin() {
    let (engine, users) = engine_with_users(2);
    let (admin, writer) = (users[0], users[1]);

    let forum = engine.create_forum("General", "", admin).await.unwrap();
    engine
        .grant_access(forum.id, writer, AccessLevel::Write, admin)
        .await
        .unwrap();

    assert!(engine.has_access(forum.id, writer, AccessLevel::Read).await);
    assert!(engine.has_access(forum.id, writer, AccessLevel::Write).await);
    assert!(!engine.has_access(forum.id, writer, AccessLevel::Admin).await);
}

#[tokio::test]
async fn test_missing_forum_and_missing_user_resolve_false() {
    let (engine, users) = engine_with_users(1);
    let forum = engine.create_forum("General", "", users[0]).await.unwrap();

    assert!(
        !engine
            .has_access(arbor_core::ForumId::new(), users[0], AccessLevel::Read)
            .await
    );
    assert!(
        !engine
            .has_access(forum.id, UserId::new(), AccessLevel::Read)
            .await
    );
}

#[tokio::test]
async fn test_regrant_replaces_level() {
    let (engine, users) = engine_with_users(2);
    let (admin, user) = (users[0], users[1]);
    let forum = engine.create_forum("General", "", admin).await.unwrap();

    engine
        .grant_access(forum.id, user, AccessLevel::Write, admin)
        .await
        .unwrap();
    engine
        .grant_access(forum.id, user, AccessLevel::Read, admin)
        .await
        .unwrap();

    assert!(!engine.has_access(forum.id, user, AccessLevel::Write).await);
    let grants = engine.forum_grants(forum.id, admin).await.unwrap();
    assert_eq!(grants.len(), 2);
    assert!(grants.contains(&(user, AccessLevel::Read)));
}
