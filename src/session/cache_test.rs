use std::sync::Arc;

use crate::constants::ANY_VERSION;
use crate::constants::CONNECTED_STATE;
use crate::test_utils::connected_client;
use crate::test_utils::sim::SimBackend;
use crate::Acl;
use crate::ClientConfig;
use crate::CreateMode;
use crate::Error;
use crate::MockConnector;
use crate::MockSession;
use crate::Session;
use crate::SessionClient;
use crate::Stat;
use crate::TransportError;

#[tokio::test]
async fn test_repeat_reads_served_from_cache() {
    let backend = SimBackend::new();
    let client = connected_client(&backend).await;
    backend.seed("/cached", b"v1");

    let (first, _) = client.cached_get_data("/cached").await.unwrap();
    assert_eq!(first.as_ref(), b"v1");
    assert_eq!(backend.op_count("get_data"), 1);

    let (second, _) = client.cached_get_data("/cached").await.unwrap();
    assert_eq!(second, first);
    // no additional transport traffic until the watch fires
    assert_eq!(backend.op_count("get_data"), 1);
}

#[tokio::test]
async fn test_invalidated_read_refetches_exactly_once() {
    let backend = SimBackend::new();
    let client = connected_client(&backend).await;
    backend.seed("/cached", b"v1");

    client.cached_get_data("/cached").await.unwrap();
    assert_eq!(backend.op_count("get_data"), 1);

    // the write fires the invalidating watch before it returns
    client
        .set_data("/cached", "v2", ANY_VERSION)
        .await
        .unwrap();

    let (fresh, _) = client.cached_get_data("/cached").await.unwrap();
    assert_eq!(fresh.as_ref(), b"v2");
    assert_eq!(backend.op_count("get_data"), 2);

    // and the new entry is again served from memory, with a new watch
    client.cached_get_data("/cached").await.unwrap();
    assert_eq!(backend.op_count("get_data"), 2);

    client
        .set_data("/cached", "v3", ANY_VERSION)
        .await
        .unwrap();
    let (fresh, _) = client.cached_get_data("/cached").await.unwrap();
    assert_eq!(fresh.as_ref(), b"v3");
    assert_eq!(backend.op_count("get_data"), 3);
}

#[tokio::test]
async fn test_exists_caches_absent_node() {
    let backend = SimBackend::new();
    let client = connected_client(&backend).await;

    assert_eq!(client.cached_exists("/later").await.unwrap(), None);
    assert_eq!(backend.op_count("exists"), 1);

    // a cached "absent" is a hit, not a miss
    assert_eq!(client.cached_exists("/later").await.unwrap(), None);
    assert_eq!(backend.op_count("exists"), 1);

    // creation fires the exists watch and invalidates the entry
    client
        .create("/later", "now", Acl::open_unsafe(), CreateMode::Persistent)
        .await
        .unwrap();

    assert!(client.cached_exists("/later").await.unwrap().is_some());
    assert_eq!(backend.op_count("exists"), 2);
}

#[tokio::test]
async fn test_children_cache_invalidated_by_child_churn() {
    let backend = SimBackend::new();
    let client = connected_client(&backend).await;
    backend.seed("/dir/a", b"");

    assert_eq!(
        client.cached_get_children("/dir").await.unwrap(),
        vec!["a".to_string()]
    );
    client.cached_get_children("/dir").await.unwrap();
    assert_eq!(backend.op_count("get_children"), 1);

    client
        .create("/dir/b", "", Acl::open_unsafe(), CreateMode::Persistent)
        .await
        .unwrap();

    assert_eq!(
        client.cached_get_children("/dir").await.unwrap(),
        vec!["a".to_string(), "b".to_string()]
    );
    assert_eq!(backend.op_count("get_children"), 2);
}

#[tokio::test]
async fn test_per_operation_caches_are_independent() {
    let backend = SimBackend::new();
    let client = connected_client(&backend).await;
    backend.seed("/node", b"x");

    client.cached_exists("/node").await.unwrap();
    client.cached_get_data("/node").await.unwrap();
    assert_eq!(backend.op_count("exists"), 1);
    assert_eq!(backend.op_count("get_data"), 1);

    // each operation kind carries its own entry and its own watch
    client.cached_exists("/node").await.unwrap();
    client.cached_get_data("/node").await.unwrap();
    assert_eq!(backend.op_count("exists"), 1);
    assert_eq!(backend.op_count("get_data"), 1);
}

#[tokio::test]
async fn test_failed_fetch_does_not_poison_the_cache() {
    let backend = SimBackend::new();
    let client = connected_client(&backend).await;

    let result = client.cached_get_data("/absent").await;
    assert!(matches!(
        result,
        Err(Error::Transport(TransportError::NoNode(_)))
    ));
    assert_eq!(backend.op_count("get_data"), 1);

    // the failure stored nothing: the next read goes out again
    let result = client.cached_get_data("/absent").await;
    assert!(result.is_err());
    assert_eq!(backend.op_count("get_data"), 2);

    backend.seed("/absent", b"present");
    let (data, _) = client.cached_get_data("/absent").await.unwrap();
    assert_eq!(data.as_ref(), b"present");
}

#[tokio::test]
async fn test_close_drops_cached_entries() {
    let backend = SimBackend::new();
    let client = connected_client(&backend).await;
    backend.seed("/kept", b"v1");

    client.cached_get_data("/kept").await.unwrap();
    assert_eq!(backend.op_count("get_data"), 1);

    client.close().await.unwrap();
    client.connect().await.unwrap();
    client
        .wait_until_connected(Some(std::time::Duration::from_secs(5)))
        .await
        .unwrap();

    // the old session's watches are gone, so the cache starts cold
    client.cached_get_data("/kept").await.unwrap();
    assert_eq!(backend.op_count("get_data"), 2);
}

#[tokio::test]
async fn test_mocked_transport_sees_one_call_per_miss() {
    let mut session = MockSession::new();
    session.expect_state_code().return_const(CONNECTED_STATE);
    session.expect_client_id().return_const(7_i64);
    session
        .expect_exists()
        .times(1)
        .returning(|_, _| Ok(Some(Stat::default())));

    let mut connector = MockConnector::new();
    connector
        .expect_connect()
        .return_once(move |_, _| Ok(Box::new(session) as Box<dyn Session>));

    let client = SessionClient::new(Arc::new(connector), ClientConfig::default());
    client.connect().await.unwrap();

    let first = client.cached_exists("/m").await.unwrap();
    let second = client.cached_exists("/m").await.unwrap();
    assert_eq!(first, second);
}
