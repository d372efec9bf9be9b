#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use viewer_assets::{encode_glb, AssetLoader, AssetProbe, AssetResolver, ModelAsset};
use viewer_cache::ResourceCache;
use viewer_core::{
    AssetError, InstanceId, Variant, VariantCatalog, ViewerConfig, ViewerObserver, ViewerState,
};
use viewer_lifecycle::{
    CanvasSize, HeadlessBackend, IntersectionEntry, LifecycleOrchestrator, ViewerContainer,
    ViewerLifecycle, ViewerServices,
};

/// How the mock loader answers a URL.
#[derive(Debug, Clone)]
pub enum Behavior {
    Succeed(Duration),
    Fail(AssetError, Duration),
    Hang,
}

pub struct MockLoader {
    calls: AtomicUsize,
    urls: Mutex<Vec<String>>,
    behaviors: Mutex<HashMap<String, Behavior>>,
    default: Behavior,
}

impl MockLoader {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            urls: Mutex::new(Vec::new()),
            behaviors: Mutex::new(HashMap::new()),
            default: Behavior::Succeed(Duration::from_millis(100)),
        }
    }

    pub fn set(&self, url: &str, behavior: Behavior) {
        self.behaviors
            .lock()
            .unwrap()
            .insert(url.to_string(), behavior);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }
}

#[async_trait]
impl AssetLoader for MockLoader {
    async fn load(&self, url: &str) -> Result<ModelAsset, AssetError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.urls.lock().unwrap().push(url.to_string());

        let behavior = self
            .behaviors
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .unwrap_or_else(|| self.default.clone());

        match behavior {
            Behavior::Succeed(delay) => {
                tokio::time::sleep(delay).await;
                let json = format!(r#"{{"asset":{{"version":"2.0"}},"meshes":[{{"name":"{}"}}]}}"#, url);
                ModelAsset::from_glb(encode_glb(&json, None))
            }
            Behavior::Fail(error, delay) => {
                tokio::time::sleep(delay).await;
                Err(error)
            }
            Behavior::Hang => futures::future::pending().await,
        }
    }
}

struct AlwaysThere;

#[async_trait]
impl AssetProbe for AlwaysThere {
    async fn exists(&self, _url: &str) -> Result<bool, AssetError> {
        Ok(true)
    }
}

#[derive(Default)]
pub struct RecordingObserver {
    transitions: Mutex<Vec<(InstanceId, ViewerState, ViewerState, Duration)>>,
    notices: Mutex<Vec<(InstanceId, String)>>,
}

impl RecordingObserver {
    pub fn transitions_for(&self, id: &InstanceId) -> Vec<(ViewerState, ViewerState)> {
        self.transitions
            .lock()
            .unwrap()
            .iter()
            .filter(|(i, ..)| i == id)
            .map(|(_, from, to, _)| (*from, *to))
            .collect()
    }

    pub fn last_elapsed(&self, id: &InstanceId) -> Option<Duration> {
        self.transitions
            .lock()
            .unwrap()
            .iter()
            .filter(|(i, ..)| i == id)
            .last()
            .map(|(.., elapsed)| *elapsed)
    }

    pub fn notices(&self) -> Vec<(InstanceId, String)> {
        self.notices.lock().unwrap().clone()
    }
}

impl ViewerObserver for RecordingObserver {
    fn on_transition(&self, id: &InstanceId, from: ViewerState, to: ViewerState, elapsed: Duration) {
        self.transitions
            .lock()
            .unwrap()
            .push((id.clone(), from, to, elapsed));
    }

    fn on_notice(&self, id: &InstanceId, message: &str) {
        self.notices
            .lock()
            .unwrap()
            .push((id.clone(), message.to_string()));
    }
}

pub fn catalog() -> VariantCatalog {
    VariantCatalog::new()
        .with_product(
            "pullup-bar",
            vec![
                Variant::new("black", "Matte Black", "#111111").as_default(),
                Variant::new("chrome", "Chrome", "#c0c0c0"),
                Variant::new("matte", "Matte Grey", "#6b6b6b"),
            ],
        )
        .unwrap()
        .with_product(
            "rings",
            vec![
                Variant::new("walnut", "Walnut", "#5c4033").as_default(),
                Variant::new("steel", "Brushed Steel", "#8a8d8f"),
            ],
        )
        .unwrap()
}

pub struct Page {
    pub orchestrator: LifecycleOrchestrator,
    pub loader: Arc<MockLoader>,
    pub backend: Arc<HeadlessBackend>,
    pub observer: Arc<RecordingObserver>,
}

impl Page {
    pub fn new() -> Self {
        Self::with_config(ViewerConfig::default())
    }

    pub fn with_config(config: ViewerConfig) -> Self {
        let catalog = catalog();
        let loader = Arc::new(MockLoader::new());
        let backend = Arc::new(HeadlessBackend::new());
        let observer = Arc::new(RecordingObserver::default());

        let resolver = AssetResolver::new(config.assets.clone(), &catalog, Arc::new(AlwaysThere));
        let cache = ResourceCache::new(resolver, loader.clone(), &config.cache);
        let services = ViewerServices::new(catalog, cache, backend.clone(), config)
            .with_observer(observer.clone());

        Self {
            orchestrator: LifecycleOrchestrator::new(services),
            loader,
            backend,
            observer,
        }
    }

    pub fn register(&self, slot: usize, product: &str) -> InstanceId {
        self.orchestrator
            .register_viewer(ViewerContainer::new(slot, CanvasSize::new(640.0, 480.0)), product)
            .unwrap()
    }

    pub fn enter(&self, ids: &[&InstanceId]) {
        let entries: Vec<IntersectionEntry> = ids
            .iter()
            .map(|id| IntersectionEntry::new((*id).clone(), 0.6, true))
            .collect();
        self.orchestrator.handle_intersections(&entries);
    }

    pub fn exit(&self, id: &InstanceId) {
        self.orchestrator
            .handle_intersections(&[IntersectionEntry::new(id.clone(), 0.0, false)]);
    }

    pub fn viewer(&self, id: &InstanceId) -> ViewerLifecycle {
        self.orchestrator.viewer(id).unwrap()
    }

    /// Register, bring into view and wait for the first load.
    pub async fn ready(&self, slot: usize, product: &str) -> InstanceId {
        let id = self.register(slot, product);
        self.enter(&[&id]);
        assert_eq!(self.viewer(&id).settled().await, ViewerState::Ready);
        id
    }
}
