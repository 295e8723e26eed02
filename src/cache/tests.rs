use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use super::config::CacheConfig;
use super::mock::MockRemoteTier;
use super::tiered::TieredCache;

fn short_config() -> CacheConfig {
    CacheConfig::default()
        .default_ttl(Duration::from_secs(60))
        .fast_capacity(4)
        .fast_max_ttl(Duration::from_secs(60))
        .cleanup_interval(Duration::from_millis(20))
}

#[tokio::test]
async fn test_memory_only_roundtrip() {
    let cache = TieredCache::memory_only(short_config());

    cache.set("k1", &json!({"a": 1}), None).await;
    let got: Option<serde_json::Value> = cache.get("k1").await;
    assert_eq!(got, Some(json!({"a": 1})));

    let missing: Option<serde_json::Value> = cache.get("nope").await;
    assert!(missing.is_none());
}

#[tokio::test]
async fn test_remote_hit_promotes_to_fast_tier() {
    let remote = Arc::new(MockRemoteTier::new());
    let cache = TieredCache::with_remote(short_config(), remote.clone());

    // Seed the remote tier directly, bypassing the fast tier.
    use super::remote::RemoteTier;
    remote
        .set_with_expiry("concord:shared", json!("v").to_string(), Duration::from_secs(60))
        .await
        .unwrap();

    let got: Option<String> = cache.get("shared").await;
    assert_eq!(got.as_deref(), Some("v"));

    // Second read must come from the fast tier: no new remote get.
    let calls_after_first = remote.get_calls();
    let again: Option<String> = cache.get("shared").await;
    assert_eq!(again.as_deref(), Some("v"));
    assert_eq!(remote.get_calls(), calls_after_first);
}

#[tokio::test]
async fn test_remote_outage_degrades_to_miss() {
    let remote = Arc::new(MockRemoteTier::new());
    let cache = TieredCache::with_remote(short_config(), remote.clone());
    remote.set_failing(true);

    // set must not error even with the remote tier down.
    cache.set("k", &json!(1), None).await;
    let got: Option<serde_json::Value> = cache.get("k").await;
    assert_eq!(got, Some(json!(1)));

    // A key only the remote tier could know is a plain miss.
    let missing: Option<serde_json::Value> = cache.get("remote-only").await;
    assert!(missing.is_none());
    assert!(cache.stats().remote_errors > 0);
}

#[tokio::test]
async fn test_set_writes_both_tiers() {
    let remote = Arc::new(MockRemoteTier::new());
    let cache = TieredCache::with_remote(short_config(), remote.clone());

    cache.set("k", &json!("v"), Some(Duration::from_secs(30))).await;
    assert_eq!(remote.set_calls(), 1);
    assert_eq!(remote.len(), 1);
}

#[tokio::test]
async fn test_invalidate_both_tiers_and_idempotent() {
    let remote = Arc::new(MockRemoteTier::new());
    let cache = TieredCache::with_remote(short_config(), remote.clone());

    cache.set("gen:1", &json!(1), None).await;
    cache.set("gen:2", &json!(2), None).await;
    cache.set("val:1", &json!(3), None).await;

    assert_eq!(cache.invalidate("gen:*").await, 2);
    assert_eq!(remote.len(), 1);

    // Zero matches is a no-op.
    assert_eq!(cache.invalidate("gen:*").await, 0);

    let kept: Option<serde_json::Value> = cache.get("val:1").await;
    assert_eq!(kept, Some(json!(3)));
}

#[tokio::test]
async fn test_clear_empties_both_tiers() {
    let remote = Arc::new(MockRemoteTier::new());
    let cache = TieredCache::with_remote(short_config(), remote.clone());

    cache.set("a", &json!(1), None).await;
    cache.set("b", &json!(2), None).await;
    cache.clear().await;

    assert!(remote.is_empty());
    let got: Option<serde_json::Value> = cache.get("a").await;
    assert!(got.is_none());
}

#[tokio::test]
async fn test_stats_hit_rate() {
    let cache = TieredCache::memory_only(short_config());

    cache.set("k", &json!(1), None).await;
    let _: Option<serde_json::Value> = cache.get("k").await;
    let _: Option<serde_json::Value> = cache.get("k").await;
    let _: Option<serde_json::Value> = cache.get("missing").await;

    let stats = cache.stats();
    assert_eq!(stats.hits, 2);
    assert_eq!(stats.misses, 1);
    assert!((stats.hit_rate() - 2.0 / 3.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_background_sweeper_removes_expired() {
    let cache = Arc::new(TieredCache::memory_only(
        short_config().fast_max_ttl(Duration::from_millis(10)),
    ));
    let handle = cache.spawn_sweeper();

    cache.set("short", &json!(1), Some(Duration::from_millis(10))).await;
    tokio::time::sleep(Duration::from_millis(80)).await;

    assert_eq!(cache.stats().entries, 0);
    cache.stop_sweeper();
    drop(handle);
}
