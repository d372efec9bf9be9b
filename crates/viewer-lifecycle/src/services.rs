//! Collaborators shared by every viewer on a page.

use std::fmt;
use std::sync::Arc;

use viewer_cache::ResourceCache;
use viewer_core::{CameraFraming, LightingPreset, VariantCatalog, ViewerConfig, ViewerObserver};
use viewer_observability::MetricsCollector;

use crate::backend::RenderBackend;

/// Everything a viewer needs besides its own state.
///
/// Built once per page and shared behind an `Arc`; the render backend is
/// injected ready to use.
pub struct ViewerServices {
    pub catalog: Arc<VariantCatalog>,
    pub cache: ResourceCache,
    pub backend: Arc<dyn RenderBackend>,
    pub config: ViewerConfig,
    pub observer: Option<Arc<dyn ViewerObserver>>,
    pub metrics: Arc<MetricsCollector>,
}

impl ViewerServices {
    pub fn new(
        catalog: VariantCatalog,
        cache: ResourceCache,
        backend: Arc<dyn RenderBackend>,
        config: ViewerConfig,
    ) -> Self {
        Self {
            catalog: Arc::new(catalog),
            cache,
            backend,
            config,
            observer: None,
            metrics: Arc::new(MetricsCollector::new()),
        }
    }

    /// Receive every transition and notice.
    pub fn with_observer(mut self, observer: Arc<dyn ViewerObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Record into an existing collector.
    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn framing(&self) -> CameraFraming {
        self.config.camera.framing()
    }

    pub fn lighting(&self) -> LightingPreset {
        self.config.lighting.preset()
    }
}

impl fmt::Debug for ViewerServices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewerServices")
            .field("products", &self.catalog.len())
            .field("cache", &self.cache)
            .field("config", &self.config)
            .field("observer", &self.observer.is_some())
            .finish()
    }
}
