//! Topology selection at the composition root.

use std::time::Duration;

use lookout_cache::{BackendKind, CacheError};
use lookout_server::config::CacheConfig;
use lookout_server::create_cache_store;
use testcontainers::runners::AsyncRunner;
use testcontainers_modules::redis::Redis;

fn unreachable(nodes: &[&str]) -> CacheConfig {
    CacheConfig {
        nodes: nodes.iter().map(|n| n.to_string()).collect(),
        connect_timeout_ms: 300,
        reconnect_interval_secs: 60,
        ..CacheConfig::default()
    }
}

#[tokio::test]
async fn test_unreachable_single_node_degrades() {
    let store = create_cache_store(&unreachable(&["127.0.0.1:1"])).await;

    assert_eq!(store.kind(), BackendKind::Fallback);
    assert!(matches!(
        store.health_check().await,
        Err(CacheError::Degraded(_))
    ));

    // Fully usable while degraded.
    store.set("a", "1".into(), Duration::ZERO).await.unwrap();
    assert_eq!(store.get("a").await.unwrap(), b"1");

    store.shutdown().await;
}

#[tokio::test]
async fn test_unreachable_cluster_degrades() {
    let store = create_cache_store(&unreachable(&["127.0.0.1:1", "127.0.0.1:2"])).await;
    assert_eq!(store.kind(), BackendKind::Fallback);
    store.shutdown().await;
}

#[tokio::test]
async fn test_live_topologies() {
    let container = Redis::default()
        .start()
        .await
        .expect("start redis container");
    let host_port = container.get_host_port_ipv4(6379).await.expect("get port");
    let addr = format!("127.0.0.1:{host_port}");

    // One node connects directly.
    let single = CacheConfig {
        nodes: vec![addr.clone()],
        ..CacheConfig::default()
    };
    let store = create_cache_store(&single).await;
    assert_eq!(store.kind(), BackendKind::SingleNode);
    assert!(store.health_check().await.is_ok());
    store.shutdown().await;

    // Several nodes on a standalone server retry the first as a single node.
    let cluster = CacheConfig {
        nodes: vec![addr.clone(), addr],
        ..CacheConfig::default()
    };
    let store = create_cache_store(&cluster).await;
    assert_eq!(store.kind(), BackendKind::SingleNode);
    store.shutdown().await;
}
