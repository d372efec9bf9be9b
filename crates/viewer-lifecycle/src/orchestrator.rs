//! Page-scoped registry of viewer instances.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use viewer_cache::ResourceCache;
use viewer_core::{InstanceId, Presentation, ProductId, VariantId, ViewerError, ViewerState};
use viewer_observability::ViewerMetrics;

use crate::backend::CanvasSize;
use crate::gate::{IntersectionEntry, IntersectionPrimitive, Rect, ViewportEvent, ViewportGate};
use crate::services::ViewerServices;
use crate::viewer::ViewerLifecycle;

/// Variant assigned to products missing from the catalog.
pub const PLACEHOLDER_VARIANT: &str = "default";

/// A viewer container found during the page scan.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ViewerContainer {
    /// Position of the container among the page's viewer slots.
    pub slot: usize,
    pub size: CanvasSize,
}

impl ViewerContainer {
    pub fn new(slot: usize, size: CanvasSize) -> Self {
        Self { slot, size }
    }
}

struct Registry {
    instances: BTreeMap<InstanceId, ViewerLifecycle>,
    gate: ViewportGate,
    page_hidden: bool,
    closed: bool,
}

/// Owns every viewer on a page and routes page-level events to them.
///
/// Viewers are created in `Idle` at registration and only allocate GPU
/// resources once the viewport gate reports them in view. `on_unload`
/// disposes everything and closes the registry.
pub struct LifecycleOrchestrator {
    services: Arc<ViewerServices>,
    registry: Mutex<Registry>,
}

impl LifecycleOrchestrator {
    /// Create an orchestrator around a page's shared services.
    pub fn new(services: ViewerServices) -> Self {
        let gate = ViewportGate::new(&services.config.viewport);
        Self {
            services: Arc::new(services),
            registry: Mutex::new(Registry {
                instances: BTreeMap::new(),
                gate,
                page_hidden: false,
                closed: false,
            }),
        }
    }

    /// Forward observe/unobserve calls to the host's intersection primitive.
    pub fn with_intersection_primitive(self, primitive: Arc<dyn IntersectionPrimitive>) -> Self {
        self.lock().gate.set_primitive(primitive);
        self
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn viewer_or_err(&self, id: &InstanceId) -> Result<ViewerLifecycle, ViewerError> {
        let registry = self.lock();
        if registry.closed {
            return Err(ViewerError::Closed);
        }
        registry
            .instances
            .get(id)
            .cloned()
            .ok_or_else(|| ViewerError::UnknownInstance(id.clone()))
    }

    /// Register a viewer for `product` in `container`.
    ///
    /// The viewer starts `Idle` on the product's default variant. A product
    /// missing from the catalog gets [`PLACEHOLDER_VARIANT`] and loads the
    /// fallback model. Registering the same slot twice returns the existing id.
    pub fn register_viewer(
        &self,
        container: ViewerContainer,
        product: impl Into<ProductId>,
    ) -> Result<InstanceId, ViewerError> {
        let product = product.into();
        let variant = match self.services.catalog.default_variant(&product) {
            Some(v) => v.variant_id.clone(),
            None => {
                tracing::warn!(%product, "product not in catalog, using fallback model");
                VariantId::new(PLACEHOLDER_VARIANT)
            }
        };

        let mut registry = self.lock();
        if registry.closed {
            return Err(ViewerError::Closed);
        }

        let id = InstanceId::for_slot(&product, container.slot);
        if registry.instances.contains_key(&id) {
            return Ok(id);
        }

        let viewer = ViewerLifecycle::new(
            id.clone(),
            product.clone(),
            variant,
            container.size,
            Arc::clone(&self.services),
        );
        if registry.page_hidden {
            viewer.on_page_visibility(true);
        }

        registry.gate.observe(&id);
        registry.instances.insert(id.clone(), viewer);
        self.services.metrics.record_registered(&id, &product);
        tracing::debug!(%id, %product, "registered viewer");
        Ok(id)
    }

    /// Switch a viewer to another variant of its product.
    pub async fn switch_variant(
        &self,
        id: &InstanceId,
        variant: impl Into<VariantId>,
    ) -> Result<(), ViewerError> {
        let viewer = self.viewer_or_err(id)?;
        viewer.switch_variant(variant).await
    }

    /// Retry a viewer that is showing its fallback.
    pub async fn retry(&self, id: &InstanceId) -> Result<(), ViewerError> {
        let viewer = self.viewer_or_err(id)?;
        viewer.retry().await
    }

    /// Dispose a viewer and drop it from the registry and the gate.
    ///
    /// Returns `false` if nothing was registered under `id`.
    pub fn dispose_viewer(&self, id: &InstanceId) -> bool {
        let viewer = {
            let mut registry = self.lock();
            registry.gate.unobserve(id);
            registry.instances.remove(id)
        };
        match viewer {
            Some(viewer) => viewer.dispose(),
            None => false,
        }
    }

    /// Feed observations from the intersection primitive.
    pub fn handle_intersections(&self, entries: &[IntersectionEntry]) -> Vec<ViewportEvent> {
        let routed: Vec<(ViewportEvent, ViewerLifecycle)> = {
            let mut registry = self.lock();
            if registry.closed {
                return Vec::new();
            }
            let events = registry.gate.process(entries);
            events
                .into_iter()
                .filter_map(|event| {
                    let viewer = registry.instances.get(event.id())?.clone();
                    Some((event, viewer))
                })
                .collect()
        };

        for (event, viewer) in &routed {
            match event {
                ViewportEvent::Enter(_) => viewer.on_enter(),
                ViewportEvent::Exit(_) => viewer.on_exit(),
            }
        }

        routed.into_iter().map(|(event, _)| event).collect()
    }

    /// Measure container rectangles against the viewport and route the result.
    pub fn handle_geometry(&self, viewport: Rect, elements: &[(InstanceId, Rect)]) -> Vec<ViewportEvent> {
        let entries: Vec<IntersectionEntry> = {
            let registry = self.lock();
            elements
                .iter()
                .map(|(id, rect)| registry.gate.measure(id, *rect, viewport))
                .collect()
        };
        self.handle_intersections(&entries)
    }

    /// The tab was hidden or shown.
    ///
    /// Hidden pauses every rendering viewer; visible resumes those in view.
    pub fn on_visibility_change(&self, hidden: bool) {
        let viewers = {
            let mut registry = self.lock();
            registry.page_hidden = hidden;
            registry.instances.values().cloned().collect::<Vec<_>>()
        };
        for viewer in viewers {
            viewer.on_page_visibility(hidden);
        }
    }

    /// The window was resized; `measure` returns each container's new size.
    ///
    /// Every live viewer records its size; those holding a render context
    /// resize it right away.
    pub fn on_resize(&self, measure: impl Fn(&InstanceId) -> Option<CanvasSize>) {
        for viewer in self.viewers() {
            if let Some(size) = measure(viewer.id()) {
                viewer.resize(size);
            }
        }
    }

    /// The page is going away: dispose every viewer in id order and close.
    pub fn on_unload(&self) -> usize {
        let viewers = {
            let mut registry = self.lock();
            registry.closed = true;
            let instances = std::mem::take(&mut registry.instances);
            for id in instances.keys() {
                registry.gate.unobserve(id);
            }
            instances
        };

        let disposed = viewers.values().filter(|viewer| viewer.dispose()).count();
        tracing::debug!(disposed, "page unloaded");
        disposed
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn state(&self, id: &InstanceId) -> Option<ViewerState> {
        self.viewer(id).map(|v| v.state())
    }

    pub fn presentation(&self, id: &InstanceId) -> Option<Presentation> {
        self.viewer(id).map(|v| v.presentation())
    }

    /// Handle to a registered viewer.
    pub fn viewer(&self, id: &InstanceId) -> Option<ViewerLifecycle> {
        self.lock().instances.get(id).cloned()
    }

    /// Registered ids, in order.
    pub fn instances(&self) -> Vec<InstanceId> {
        self.lock().instances.keys().cloned().collect()
    }

    fn viewers(&self) -> Vec<ViewerLifecycle> {
        self.lock().instances.values().cloned().collect()
    }

    /// Wait until no viewer has a load in flight.
    pub async fn settled(&self) {
        for viewer in self.viewers() {
            viewer.settled().await;
        }
    }

    pub fn cache(&self) -> &ResourceCache {
        &self.services.cache
    }

    pub fn services(&self) -> &Arc<ViewerServices> {
        &self.services
    }

    pub fn metrics(&self) -> ViewerMetrics {
        self.services.metrics.snapshot()
    }
}

impl Drop for LifecycleOrchestrator {
    fn drop(&mut self) {
        if !self.is_closed() {
            self.on_unload();
        }
    }
}
