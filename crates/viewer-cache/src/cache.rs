//! Coalescing resource cache.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::future::{self, BoxFuture, FutureExt};
use tokio::time::Instant;
use viewer_assets::{AssetHandle, AssetLoader, AssetResolver};
use viewer_core::config::CacheConfig;
use viewer_core::AssetKey;

use crate::entry::{CacheEntry, CacheStatus, EntryState, LoadResult, SharedLoad};
use crate::stats::{CacheStats, StatsCounters};

/// Page-wide cache of loaded 3D assets.
///
/// Guarantees at most one loader call per asset key while an entry exists:
/// concurrent requesters attach to the same in-flight load, resolved assets
/// are handed out without I/O, and failures are replayed until the
/// cool-down elapses.
///
/// Loads are driven by a spawned task, so a requester that stops waiting
/// (timeout, dispose) never cancels the fetch for anyone else.
#[derive(Clone)]
pub struct ResourceCache {
    inner: Arc<CacheInner>,
}

struct CacheInner {
    resolver: AssetResolver,
    loader: Arc<dyn AssetLoader>,
    failure_cooldown: Duration,
    entries: Mutex<HashMap<AssetKey, CacheEntry>>,
    next_generation: AtomicU64,
    stats: StatsCounters,
}

impl ResourceCache {
    /// Create a new cache.
    pub fn new(resolver: AssetResolver, loader: Arc<dyn AssetLoader>, config: &CacheConfig) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                resolver,
                loader,
                failure_cooldown: config.failure_cooldown(),
                entries: Mutex::new(HashMap::new()),
                next_generation: AtomicU64::new(1),
                stats: StatsCounters::default(),
            }),
        }
    }

    /// The resolver used to turn keys into URLs.
    pub fn resolver(&self) -> &AssetResolver {
        &self.inner.resolver
    }

    /// Get the asset for `key`, loading it if needed.
    ///
    /// The lookup and the creation of a pending entry happen before this
    /// returns, so two calls in the same tick always share one load. Every
    /// call takes a reference that must be returned with [`release`].
    ///
    /// Must be called within a Tokio runtime.
    ///
    /// [`release`]: ResourceCache::release
    pub fn acquire(&self, key: &AssetKey) -> BoxFuture<'static, LoadResult> {
        let mut entries = self.inner.lock_entries();
        self.inner.sweep_expired_failures(&mut entries);

        if let Some(entry) = entries.get_mut(key) {
            let served = match &entry.state {
                EntryState::Resolved { handle } => {
                    StatsCounters::bump(&self.inner.stats.hits);
                    Some(future::ready(Ok(handle.clone())).boxed())
                }
                EntryState::Pending { load } => {
                    StatsCounters::bump(&self.inner.stats.coalesced);
                    Some(load.clone().boxed())
                }
                EntryState::Failed { error, failed_at }
                    if failed_at.elapsed() < self.inner.failure_cooldown =>
                {
                    StatsCounters::bump(&self.inner.stats.failures_served);
                    Some(future::ready(Err(error.clone())).boxed())
                }
                EntryState::Failed { .. } => None,
            };

            if let Some(served) = served {
                entry.ref_count += 1;
                return served;
            }
        }

        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
        let load = CacheInner::start_load(&self.inner, key.clone(), generation);
        let entry = entries
            .entry(key.clone())
            .or_insert_with(|| CacheEntry::pending(load.clone(), generation));
        entry.state = EntryState::Pending { load: load.clone() };
        entry.generation = generation;
        entry.ref_count += 1;
        drop(entries);

        StatsCounters::bump(&self.inner.stats.loads_started);
        tokio::spawn(load.clone());
        load.boxed()
    }

    /// Return a reference taken by [`acquire`](ResourceCache::acquire).
    ///
    /// A resolved entry whose count reaches zero is evicted. Pending and
    /// failed entries stay, so a late success is still cached. Unreferenced
    /// failures are dropped by the first `acquire` after their cool-down.
    pub fn release(&self, key: &AssetKey) {
        let mut entries = self.inner.lock_entries();
        let Some(entry) = entries.get_mut(key) else {
            return;
        };

        entry.ref_count = entry.ref_count.saturating_sub(1);
        if entry.ref_count == 0 && entry.status() == CacheStatus::Resolved {
            entries.remove(key);
            StatsCounters::bump(&self.inner.stats.evictions);
            tracing::debug!(%key, "evicted asset");
        }
    }

    /// Current status of the entry for `key`.
    pub fn status(&self, key: &AssetKey) -> Option<CacheStatus> {
        self.inner.lock_entries().get(key).map(CacheEntry::status)
    }

    /// Outstanding references to `key`.
    pub fn ref_count(&self, key: &AssetKey) -> usize {
        self.inner
            .lock_entries()
            .get(key)
            .map_or(0, |entry| entry.ref_count)
    }

    /// The resolved handle for `key`, without taking a reference.
    pub fn peek(&self, key: &AssetKey) -> Option<AssetHandle> {
        match &self.inner.lock_entries().get(key)?.state {
            EntryState::Resolved { handle } => Some(handle.clone()),
            _ => None,
        }
    }

    /// Drop every failed entry so the next request refetches immediately.
    pub fn purge_failures(&self) -> usize {
        let mut entries = self.inner.lock_entries();
        let before = entries.len();
        entries.retain(|_, entry| entry.status() != CacheStatus::Failed);
        before - entries.len()
    }

    /// Number of entries in any state.
    pub fn len(&self) -> usize {
        self.inner.lock_entries().len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Counters since creation.
    pub fn stats(&self) -> CacheStats {
        self.inner.stats.snapshot()
    }
}

impl CacheInner {
    fn lock_entries(&self) -> MutexGuard<'_, HashMap<AssetKey, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Drop unreferenced failures whose cool-down has elapsed.
    fn sweep_expired_failures(&self, entries: &mut HashMap<AssetKey, CacheEntry>) {
        let cooldown = self.failure_cooldown;
        entries.retain(|key, entry| {
            let expired = entry.ref_count == 0
                && matches!(
                    &entry.state,
                    EntryState::Failed { failed_at, .. } if failed_at.elapsed() >= cooldown
                );
            if expired {
                tracing::debug!(%key, "dropped expired failure");
            }
            !expired
        });
    }

    /// Build the shared load for `key`.
    ///
    /// The entry is updated inside the load itself, before any requester
    /// can observe the outcome.
    fn start_load(inner: &Arc<CacheInner>, key: AssetKey, generation: u64) -> SharedLoad {
        let cache = Arc::downgrade(inner);
        let loader = Arc::clone(&inner.loader);
        let url = inner.resolver.model_url(&key);

        async move {
            tracing::debug!(%key, %url, generation, "loading asset");
            let outcome = loader
                .load(&url)
                .await
                .map(|model| AssetHandle::new(key.clone(), url.clone(), model));

            if let Some(cache) = cache.upgrade() {
                cache.complete(&key, generation, &outcome);
            }
            outcome
        }
        .boxed()
        .shared()
    }

    fn complete(&self, key: &AssetKey, generation: u64, outcome: &LoadResult) {
        let mut entries = self.lock_entries();
        let Some(entry) = entries.get_mut(key) else {
            return;
        };

        if entry.generation != generation || entry.status() != CacheStatus::Pending {
            tracing::debug!(%key, generation, "ignoring stale load completion");
            return;
        }

        match outcome {
            Ok(handle) => {
                tracing::debug!(%key, bytes = handle.model().byte_len(), "asset resolved");
                entry.state = EntryState::Resolved {
                    handle: handle.clone(),
                };
                StatsCounters::bump(&self.stats.loads_succeeded);
            }
            Err(error) => {
                tracing::warn!(%key, kind = error.kind(), %error, "asset load failed");
                entry.state = EntryState::Failed {
                    error: error.clone(),
                    failed_at: Instant::now(),
                };
                StatsCounters::bump(&self.stats.loads_failed);
            }
        }
    }
}

impl fmt::Debug for ResourceCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceCache")
            .field("entries", &self.len())
            .field("failure_cooldown", &self.inner.failure_cooldown)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    use async_trait::async_trait;
    use viewer_assets::{encode_glb, AssetProbe, ModelAsset};
    use viewer_core::config::AssetPathConfig;
    use viewer_core::{AssetError, Variant, VariantCatalog};

    #[derive(Default)]
    struct MockLoader {
        calls: AtomicUsize,
        urls: Mutex<Vec<String>>,
        failures: Mutex<HashMap<String, AssetError>>,
        delay: Duration,
    }

    impl MockLoader {
        fn with_delay(delay: Duration) -> Self {
            Self {
                delay,
                ..Default::default()
            }
        }

        fn fail(&self, url: &str, error: AssetError) {
            self.failures.lock().unwrap().insert(url.to_string(), error);
        }

        fn heal(&self, url: &str) {
            self.failures.lock().unwrap().remove(url);
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl AssetLoader for MockLoader {
        async fn load(&self, url: &str) -> Result<ModelAsset, AssetError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.urls.lock().unwrap().push(url.to_string());
            tokio::time::sleep(self.delay).await;

            let failure = self.failures.lock().unwrap().get(url).cloned();
            if let Some(error) = failure {
                return Err(error);
            }
            ModelAsset::from_glb(encode_glb(r#"{"asset":{"version":"2.0"},"meshes":[{}]}"#, None))
        }
    }

    struct AlwaysThere;

    #[async_trait]
    impl AssetProbe for AlwaysThere {
        async fn exists(&self, _url: &str) -> Result<bool, AssetError> {
            Ok(true)
        }
    }

    fn cache_with(loader: Arc<MockLoader>) -> ResourceCache {
        let catalog = VariantCatalog::new()
            .with_product(
                "rings",
                vec![
                    Variant::new("walnut", "Walnut", "#5c4033").as_default(),
                    Variant::new("steel", "Brushed Steel", "#8a8d8f"),
                ],
            )
            .unwrap();
        let resolver = AssetResolver::new(AssetPathConfig::default(), &catalog, Arc::new(AlwaysThere));
        ResourceCache::new(resolver, loader, &CacheConfig::default())
    }

    fn walnut() -> AssetKey {
        AssetKey::new("rings", "walnut")
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_acquires_share_one_load() {
        let loader = Arc::new(MockLoader::with_delay(Duration::from_millis(300)));
        let cache = cache_with(loader.clone());

        let requests: Vec<_> = (0..5).map(|_| cache.acquire(&walnut())).collect();
        assert_eq!(cache.status(&walnut()), Some(CacheStatus::Pending));

        let handles: Vec<_> = future::join_all(requests)
            .await
            .into_iter()
            .map(Result::unwrap)
            .collect();

        assert_eq!(loader.calls(), 1);
        assert!(handles.iter().all(|h| h.ptr_eq(&handles[0])));
        assert_eq!(cache.ref_count(&walnut()), 5);

        let stats = cache.stats();
        assert_eq!(stats.loads_started, 1);
        assert_eq!(stats.coalesced, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolved_entry_is_served_without_io() {
        let loader = Arc::new(MockLoader::default());
        let cache = cache_with(loader.clone());

        let first = cache.acquire(&walnut()).await.unwrap();
        assert_eq!(cache.status(&walnut()), Some(CacheStatus::Resolved));

        let second = cache.acquire(&walnut()).await.unwrap();
        assert!(first.ptr_eq(&second));
        assert_eq!(loader.calls(), 1);
        assert_eq!(cache.stats().hits, 1);
        assert_eq!(first.url(), "/models/rings-walnut.glb");
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_served_during_cooldown_then_refetched() {
        let loader = Arc::new(MockLoader::default());
        loader.fail(
            "/models/rings-walnut.glb",
            AssetError::Network("connection reset".into()),
        );
        let cache = cache_with(loader.clone());

        let err = cache.acquire(&walnut()).await.unwrap_err();
        assert_eq!(err.kind(), "network");
        assert_eq!(cache.status(&walnut()), Some(CacheStatus::Failed));

        let again = cache.acquire(&walnut()).await.unwrap_err();
        assert_eq!(again, err);
        assert_eq!(loader.calls(), 1);
        assert_eq!(cache.stats().failures_served, 1);

        loader.heal("/models/rings-walnut.glb");
        tokio::time::advance(Duration::from_secs(11)).await;

        assert!(cache.acquire(&walnut()).await.is_ok());
        assert_eq!(loader.calls(), 2);
        assert_eq!(cache.status(&walnut()), Some(CacheStatus::Resolved));
    }

    #[tokio::test(start_paused = true)]
    async fn test_errors_keep_their_kind() {
        let loader = Arc::new(MockLoader::default());
        loader.fail(
            "/models/rings-walnut.glb",
            AssetError::NotFound {
                url: "/models/rings-walnut.glb".into(),
            },
        );
        loader.fail(
            "/models/rings-steel.glb",
            AssetError::Decode("bad magic".into()),
        );
        let cache = cache_with(loader.clone());

        let not_found = cache.acquire(&walnut()).await.unwrap_err();
        let decode = cache
            .acquire(&AssetKey::new("rings", "steel"))
            .await
            .unwrap_err();

        assert_eq!(not_found.kind(), "not_found");
        assert_eq!(decode.kind(), "decode");
        assert_eq!(cache.stats().loads_failed, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_last_release_evicts_resolved_entry() {
        let loader = Arc::new(MockLoader::default());
        let cache = cache_with(loader.clone());

        cache.acquire(&walnut()).await.unwrap();
        cache.acquire(&walnut()).await.unwrap();

        cache.release(&walnut());
        assert_eq!(cache.status(&walnut()), Some(CacheStatus::Resolved));

        cache.release(&walnut());
        assert_eq!(cache.status(&walnut()), None);
        assert_eq!(cache.stats().evictions, 1);

        cache.acquire(&walnut()).await.unwrap();
        assert_eq!(loader.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_load_completes_and_stays_cached() {
        let loader = Arc::new(MockLoader::with_delay(Duration::from_secs(1)));
        let cache = cache_with(loader.clone());

        let request = cache.acquire(&walnut());
        drop(request);
        cache.release(&walnut());
        assert_eq!(cache.status(&walnut()), Some(CacheStatus::Pending));

        tokio::time::sleep(Duration::from_secs(2)).await;

        assert_eq!(cache.status(&walnut()), Some(CacheStatus::Resolved));
        assert_eq!(cache.ref_count(&walnut()), 0);
        assert!(cache.peek(&walnut()).is_some());

        cache.acquire(&walnut()).await.unwrap();
        assert_eq!(loader.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_product_loads_fallback_model() {
        let loader = Arc::new(MockLoader::default());
        let cache = cache_with(loader.clone());

        let handle = cache
            .acquire(&AssetKey::new("kettlebell", "red"))
            .await
            .unwrap();
        assert_eq!(handle.url(), "/models/fallback.glb");
        assert_eq!(loader.urls.lock().unwrap().as_slice(), ["/models/fallback.glb"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreferenced_failure_dropped_after_cooldown() {
        let loader = Arc::new(MockLoader::default());
        loader.fail("/models/rings-walnut.glb", AssetError::Network("reset".into()));
        let cache = cache_with(loader.clone());
        let steel = AssetKey::new("rings", "steel");

        cache.acquire(&walnut()).await.unwrap_err();
        cache.release(&walnut());
        assert_eq!(cache.status(&walnut()), Some(CacheStatus::Failed));

        // Still replayed inside the cool-down.
        cache.acquire(&steel).await.unwrap();
        assert_eq!(cache.status(&walnut()), Some(CacheStatus::Failed));

        tokio::time::advance(Duration::from_secs(11)).await;
        cache.acquire(&steel).await.unwrap();

        assert_eq!(cache.status(&walnut()), None);
        assert_eq!(cache.len(), 1);
        assert_eq!(loader.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_failures() {
        let loader = Arc::new(MockLoader::default());
        loader.fail("/models/rings-walnut.glb", AssetError::Network("reset".into()));
        let cache = cache_with(loader.clone());

        cache.acquire(&walnut()).await.unwrap_err();
        cache.acquire(&AssetKey::new("rings", "steel")).await.unwrap();

        assert_eq!(cache.purge_failures(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.status(&walnut()), None);
    }
}
