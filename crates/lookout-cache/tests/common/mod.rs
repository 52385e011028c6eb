//! Behavioural contract shared by every cache backend.
//!
//! Each check takes a namespace so suites can share one store (for example a
//! single Redis container) without seeing each other's keys.

#![allow(dead_code)]

use std::time::Duration;

use lookout_cache::{CacheStore, CacheStoreExt, UserSession};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: u32,
    pub title: String,
    pub tags: Vec<String>,
}

/// Run every contract check against `store`.
pub async fn run_all(store: &dyn CacheStore, ns: &str) {
    set_then_get(store, ns).await;
    delete_then_get_misses(store, ns).await;
    structured_values_roundtrip(store, ns).await;
    zero_ttl_uses_default(store, ns).await;
    session_lifecycle(store, ns).await;
    session_rewrite_does_not_duplicate(store, ns).await;
    sessions_are_tenant_scoped(store, ns).await;
    session_moved_to_other_tenant_is_not_listed(store, ns).await;
    pattern_index_deduplicates(store, ns).await;
    pattern_index_delete_keeps_members(store, ns).await;
    invalidate_pattern_removes_members(store, ns).await;
    delete_multiple_skips_missing_keys(store, ns).await;
    query_results_are_namespaced(store, ns).await;
    lock_release_allows_reacquire(store, ns).await;
}

/// `Set("a","1")` then `Get("a") == "1"`.
pub async fn set_then_get(store: &dyn CacheStore, ns: &str) {
    let key = format!("{ns}:a");
    store.set(&key, "1".into(), Duration::from_secs(60)).await.unwrap();
    assert_eq!(store.get(&key).await.unwrap(), b"1");

    store.set(&key, "2".into(), Duration::from_secs(60)).await.unwrap();
    assert_eq!(store.get(&key).await.unwrap(), b"2");
}

/// `Delete("a")` then `Get("a")` is NotFound; deleting again is fine.
pub async fn delete_then_get_misses(store: &dyn CacheStore, ns: &str) {
    let key = format!("{ns}:a");
    store.set(&key, "1".into(), Duration::from_secs(60)).await.unwrap();
    store.delete(&key).await.unwrap();
    assert!(store.get(&key).await.unwrap_err().is_not_found());
    store.delete(&key).await.unwrap();

    assert!(store.get(&format!("{ns}:never")).await.unwrap_err().is_not_found());
}

pub async fn structured_values_roundtrip(store: &dyn CacheStore, ns: &str) {
    let key = format!("{ns}:report");
    let report = Report {
        id: 7,
        title: "weekly".into(),
        tags: vec!["ops".into(), "billing".into()],
    };
    store.set_json(&key, &report, Duration::from_secs(60)).await.unwrap();
    assert_eq!(store.get_json::<Report>(&key).await.unwrap(), report);

    let raw = format!("{ns}:raw");
    store
        .set(&raw, vec![0u8, 159, 146, 150].into(), Duration::from_secs(60))
        .await
        .unwrap();
    assert_eq!(store.get(&raw).await.unwrap(), vec![0u8, 159, 146, 150]);
}

pub async fn zero_ttl_uses_default(store: &dyn CacheStore, ns: &str) {
    let key = format!("{ns}:default-ttl");
    store.set(&key, "v".into(), Duration::ZERO).await.unwrap();
    assert_eq!(store.get(&key).await.unwrap(), b"v");
}

/// `SetSession` → one active session; `InvalidateSession` → none.
pub async fn session_lifecycle(store: &dyn CacheStore, ns: &str) {
    let tenant = format!("{ns}-t1");
    let id = format!("{ns}-tok1");
    let mut session = UserSession::new(&id, &tenant, "alice").with_roles(["admin"]);
    let created = session.last_activity;

    store.set_session(&mut session).await.unwrap();
    assert!(session.last_activity >= created);

    let stored = store.get_session(&id).await.unwrap();
    assert_eq!(stored.id, id);
    assert_eq!(stored.user_id, "alice");
    assert_eq!(stored.roles, vec!["admin"]);

    let active = store.get_active_sessions(&tenant).await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, id);

    store.invalidate_session(&id).await.unwrap();
    assert!(store.get_session(&id).await.unwrap_err().is_not_found());
    assert!(store.get_active_sessions(&tenant).await.unwrap().is_empty());

    // Invalidating an unknown session is not an error.
    store.invalidate_session(&id).await.unwrap();
}

pub async fn session_rewrite_does_not_duplicate(store: &dyn CacheStore, ns: &str) {
    let tenant = format!("{ns}-t2");
    let id = format!("{ns}-tok2");
    let mut session = UserSession::new(&id, &tenant, "bob");

    store.set_session(&mut session).await.unwrap();
    session.roles.push("viewer".into());
    store.set_session(&mut session).await.unwrap();

    let active = store.get_active_sessions(&tenant).await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].roles, vec!["viewer"]);

    store.invalidate_session(&id).await.unwrap();
}

pub async fn sessions_are_tenant_scoped(store: &dyn CacheStore, ns: &str) {
    let tenant_a = format!("{ns}-ta");
    let tenant_b = format!("{ns}-tb");
    let mut a = UserSession::new(format!("{ns}-sa"), &tenant_a, "alice");
    let mut b = UserSession::new(format!("{ns}-sb"), &tenant_b, "bob");
    store.set_session(&mut a).await.unwrap();
    store.set_session(&mut b).await.unwrap();

    let listed: Vec<String> = store
        .get_active_sessions(&tenant_a)
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.id)
        .collect();
    assert_eq!(listed, vec![a.id.clone()]);
    assert!(
        store
            .get_active_sessions(&format!("{ns}-nobody"))
            .await
            .unwrap()
            .is_empty()
    );

    store.invalidate_session(&a.id).await.unwrap();
    store.invalidate_session(&b.id).await.unwrap();
}

/// Re-saving a session under a new tenant hides it from the old tenant.
pub async fn session_moved_to_other_tenant_is_not_listed(store: &dyn CacheStore, ns: &str) {
    let old_tenant = format!("{ns}-move-from");
    let new_tenant = format!("{ns}-move-to");
    let mut session = UserSession::new(format!("{ns}-moved"), &old_tenant, "frank");
    store.set_session(&mut session).await.unwrap();

    session.tenant_id = new_tenant.clone();
    store.set_session(&mut session).await.unwrap();

    assert!(store.get_active_sessions(&old_tenant).await.unwrap().is_empty());
    // The stale reference was pruned, so a second listing agrees.
    assert!(store.get_active_sessions(&old_tenant).await.unwrap().is_empty());

    let listed: Vec<String> = store
        .get_active_sessions(&new_tenant)
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.id)
        .collect();
    assert_eq!(listed, vec![session.id.clone()]);

    store.invalidate_session(&session.id).await.unwrap();
    assert!(store.get_active_sessions(&new_tenant).await.unwrap().is_empty());
}

/// `AddToPatternIndex("p1","k1")` twice → `["k1"]`.
pub async fn pattern_index_deduplicates(store: &dyn CacheStore, ns: &str) {
    let pattern = format!("{ns}:p1");
    let key = format!("{ns}:k1");
    store.add_to_pattern_index(&pattern, &key).await.unwrap();
    store.add_to_pattern_index(&pattern, &key).await.unwrap();
    assert_eq!(store.get_pattern_index_keys(&pattern).await.unwrap(), vec![key]);

    assert!(
        store
            .get_pattern_index_keys(&format!("{ns}:unknown"))
            .await
            .unwrap()
            .is_empty()
    );
}

/// `DeletePatternIndex("p1")` → `[]`, and members are left in place.
pub async fn pattern_index_delete_keeps_members(store: &dyn CacheStore, ns: &str) {
    let pattern = format!("{ns}:p2");
    let key = format!("{ns}:k2");
    store.set(&key, "kept".into(), Duration::from_secs(60)).await.unwrap();
    store.add_to_pattern_index(&pattern, &key).await.unwrap();

    store.delete_pattern_index(&pattern).await.unwrap();
    assert!(store.get_pattern_index_keys(&pattern).await.unwrap().is_empty());
    assert_eq!(store.get(&key).await.unwrap(), b"kept");
}

pub async fn invalidate_pattern_removes_members(store: &dyn CacheStore, ns: &str) {
    let pattern = format!("{ns}:patients");
    let keys: Vec<String> = (0..3).map(|i| format!("{ns}:patient:{i}")).collect();
    for key in &keys {
        store.set(key, "row".into(), Duration::from_secs(60)).await.unwrap();
        store.add_to_pattern_index(&pattern, key).await.unwrap();
    }

    assert_eq!(store.invalidate_pattern(&pattern).await.unwrap(), 3);
    for key in &keys {
        assert!(store.get(key).await.unwrap_err().is_not_found());
    }
    assert!(store.get_pattern_index_keys(&pattern).await.unwrap().is_empty());
}

pub async fn delete_multiple_skips_missing_keys(store: &dyn CacheStore, ns: &str) {
    let present = format!("{ns}:present");
    store.set(&present, "x".into(), Duration::from_secs(60)).await.unwrap();

    store
        .delete_multiple(&[format!("{ns}:missing"), present.clone()])
        .await
        .unwrap();
    assert!(store.get(&present).await.unwrap_err().is_not_found());

    store.delete_multiple(&[]).await.unwrap();
}

pub async fn query_results_are_namespaced(store: &dyn CacheStore, ns: &str) {
    let hash = format!("{ns}-q1");
    let rows = vec![1u32, 2, 3];
    store
        .cache_query_json(&hash, &rows, Duration::from_secs(60))
        .await
        .unwrap();

    assert_eq!(store.get_cached_query_json::<Vec<u32>>(&hash).await.unwrap(), rows);
    assert!(store.get(&hash).await.unwrap_err().is_not_found());
    assert!(store.get(&format!("query_cache:{hash}")).await.is_ok());
}

pub async fn lock_release_allows_reacquire(store: &dyn CacheStore, ns: &str) {
    let name = format!("{ns}-job");
    assert!(store.acquire_lock(&name, Duration::from_secs(30)).await.unwrap());
    store.release_lock(&name).await.unwrap();
    assert!(store.acquire_lock(&name, Duration::from_secs(30)).await.unwrap());
    store.release_lock(&name).await.unwrap();
}
