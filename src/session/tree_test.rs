use tracing_test::traced_test;

use super::tree::join;
use crate::test_utils::connected_client;
use crate::test_utils::sim::SimBackend;
use crate::Acl;
use crate::CreateMode;

#[test]
fn test_join_builds_child_paths() {
    assert_eq!(join("/a", "b"), "/a/b");
    assert_eq!(join("/", "b"), "/b");
}

#[tokio::test]
async fn test_delete_removes_chain_child_first() {
    let backend = SimBackend::new();
    let client = connected_client(&backend).await;
    backend.seed("/a/b/c", b"");

    let blocked = client.delete_recursive("/a", false, false).await.unwrap();

    assert!(!blocked);
    assert_eq!(backend.deletions(), vec!["/a/b/c", "/a/b", "/a"]);
    assert!(!backend.contains("/a"));
}

#[tokio::test]
async fn test_ephemeral_child_blocks_whole_chain() {
    let backend = SimBackend::new();
    let client = connected_client(&backend).await;
    backend.seed("/a", b"");
    client
        .create("/a/b", "", Acl::open_unsafe(), CreateMode::Ephemeral)
        .await
        .unwrap();

    let blocked = client.delete_recursive("/a", false, false).await.unwrap();

    assert!(blocked);
    assert!(backend.contains("/a"));
    assert!(backend.contains("/a/b"));

    let blocked = client.delete_recursive("/a", false, true).await.unwrap();

    assert!(!blocked);
    assert!(!backend.contains("/a"));
    assert!(!backend.contains("/a/b"));
}

#[tokio::test]
async fn test_deep_ephemeral_preserves_ancestors_but_not_siblings() {
    let backend = SimBackend::new();
    let client = connected_client(&backend).await;
    backend.seed("/r/mid", b"");
    backend.seed("/r/side", b"");
    backend.seed_ephemeral("/r/mid/eph", b"");

    let blocked = client.delete_recursive("/r", false, false).await.unwrap();

    assert!(blocked);
    // the ephemeral keeps its whole ancestor chain alive
    assert!(backend.contains("/r"));
    assert!(backend.contains("/r/mid"));
    assert!(backend.contains("/r/mid/eph"));
    // the unrelated sibling subtree is gone
    assert_eq!(backend.deletions(), vec!["/r/side"]);
}

#[tokio::test]
#[traced_test]
async fn test_dry_run_reports_without_mutating() {
    let backend = SimBackend::new();
    let client = connected_client(&backend).await;
    backend.seed("/d/keep", b"");
    backend.seed_ephemeral("/d/eph", b"");

    let blocked = client.delete_recursive("/d", true, false).await.unwrap();

    assert!(blocked);
    assert!(backend.deletions().is_empty());
    assert!(backend.contains("/d"));
    assert!(backend.contains("/d/keep"));
    assert!(backend.contains("/d/eph"));
    assert!(logs_contain("would delete"));
    assert!(logs_contain("would skip"));
}

#[tokio::test]
async fn test_dry_run_with_force_reports_full_deletion() {
    let backend = SimBackend::new();
    let client = connected_client(&backend).await;
    backend.seed_ephemeral("/d/eph", b"");

    let blocked = client.delete_recursive("/d", true, true).await.unwrap();

    assert!(!blocked);
    assert!(backend.deletions().is_empty());
    assert!(backend.contains("/d/eph"));
}

#[tokio::test]
async fn test_missing_subtree_is_not_an_error() {
    let backend = SimBackend::new();
    let client = connected_client(&backend).await;

    let blocked = client.delete_recursive("/ghost", false, false).await.unwrap();

    assert!(!blocked);
    assert!(backend.deletions().is_empty());
}

#[tokio::test]
async fn test_ephemeral_leaf_is_skipped_without_force() {
    let backend = SimBackend::new();
    let client = connected_client(&backend).await;
    client
        .create("/eph", "", Acl::open_unsafe(), CreateMode::Ephemeral)
        .await
        .unwrap();

    assert!(client.delete_recursive("/eph", false, false).await.unwrap());
    assert!(backend.contains("/eph"));

    assert!(!client.delete_recursive("/eph", false, true).await.unwrap());
    assert!(!backend.contains("/eph"));
}
