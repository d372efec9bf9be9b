//! Render engine collaborator.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use viewer_assets::AssetHandle;
use viewer_core::{AssetKey, CameraState, InstanceId, LightingPreset, ViewerError};

/// Canvas dimensions in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CanvasSize {
    pub width: f64,
    pub height: f64,
}

impl CanvasSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Opaque id of a render context (canvas, GL context, controls).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextHandle(pub u64);

/// Opaque id of a model root attached to a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModelRoot(pub u64);

/// The rendering engine, seen from the lifecycle.
///
/// Calls are synchronous and cheap; uploads happen inside `attach_model`.
/// Every handle returned here is owned by exactly one viewer instance.
pub trait RenderBackend: Send + Sync {
    /// Allocate a render context for an instance.
    fn create_context(&self, id: &InstanceId, size: CanvasSize) -> Result<ContextHandle, ViewerError>;

    /// Upload an asset and attach it as a new model root.
    fn attach_model(&self, ctx: ContextHandle, asset: &AssetHandle) -> Result<ModelRoot, ViewerError>;

    /// Detach a model root and free its GPU buffers.
    fn detach_model(&self, ctx: ContextHandle, root: ModelRoot);

    /// Apply environment, exposure and shadow settings.
    fn apply_lighting(&self, ctx: ContextHandle, preset: &LightingPreset) -> Result<(), ViewerError>;

    /// Read the live camera placement.
    fn camera(&self, ctx: ContextHandle) -> Option<CameraState>;

    /// Move the camera.
    fn set_camera(&self, ctx: ContextHandle, camera: &CameraState);

    fn start_render_loop(&self, ctx: ContextHandle);

    fn stop_render_loop(&self, ctx: ContextHandle);

    fn resize(&self, ctx: ContextHandle, size: CanvasSize);

    /// Free the context and everything still attached to it.
    fn dispose_context(&self, ctx: ContextHandle);
}

/// State of one context in the [`HeadlessBackend`].
#[derive(Debug, Clone, PartialEq)]
pub struct HeadlessContext {
    pub owner: InstanceId,
    pub size: CanvasSize,
    pub camera: CameraState,
    pub lighting: Option<LightingPreset>,
    pub models: Vec<(ModelRoot, AssetKey)>,
    pub rendering: bool,
}

/// Call counters kept by the [`HeadlessBackend`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackendCounters {
    pub contexts_created: u64,
    pub contexts_disposed: u64,
    pub models_attached: u64,
    pub models_detached: u64,
    pub lighting_applied: u64,
    pub loop_starts: u64,
    pub loop_stops: u64,
}

#[derive(Debug, Default)]
struct HeadlessState {
    contexts: HashMap<ContextHandle, HeadlessContext>,
    counters: BackendCounters,
}

/// In-memory backend with no GPU.
///
/// Keeps the bookkeeping a real engine would (contexts, attached roots,
/// camera, loop state) so the lifecycle can be driven from a CLI or tests.
/// Like most engines it reframes the camera when a model is attached.
#[derive(Debug, Default)]
pub struct HeadlessBackend {
    next_id: AtomicU64,
    state: Mutex<HeadlessState>,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HeadlessState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Snapshot of a live context.
    pub fn context(&self, ctx: ContextHandle) -> Option<HeadlessContext> {
        self.lock().contexts.get(&ctx).cloned()
    }

    /// The live context owned by an instance, if any.
    pub fn context_for(&self, id: &InstanceId) -> Option<HeadlessContext> {
        self.lock()
            .contexts
            .values()
            .find(|c| &c.owner == id)
            .cloned()
    }

    /// Number of contexts not yet disposed.
    pub fn live_contexts(&self) -> usize {
        self.lock().contexts.len()
    }

    pub fn counters(&self) -> BackendCounters {
        self.lock().counters
    }
}

impl RenderBackend for HeadlessBackend {
    fn create_context(&self, id: &InstanceId, size: CanvasSize) -> Result<ContextHandle, ViewerError> {
        let ctx = ContextHandle(self.next());
        let mut state = self.lock();
        state.contexts.insert(
            ctx,
            HeadlessContext {
                owner: id.clone(),
                size,
                camera: CameraState::default(),
                lighting: None,
                models: Vec::new(),
                rendering: false,
            },
        );
        state.counters.contexts_created += 1;
        Ok(ctx)
    }

    fn attach_model(&self, ctx: ContextHandle, asset: &AssetHandle) -> Result<ModelRoot, ViewerError> {
        let root = ModelRoot(self.next());
        let mut state = self.lock();
        let context = state
            .contexts
            .get_mut(&ctx)
            .ok_or_else(|| ViewerError::Render(format!("no context {:?}", ctx)))?;
        context.models.push((root, asset.key().clone()));
        context.camera = CameraState::default();
        state.counters.models_attached += 1;
        Ok(root)
    }

    fn detach_model(&self, ctx: ContextHandle, root: ModelRoot) {
        let mut state = self.lock();
        if let Some(context) = state.contexts.get_mut(&ctx) {
            context.models.retain(|(r, _)| *r != root);
            state.counters.models_detached += 1;
        }
    }

    fn apply_lighting(&self, ctx: ContextHandle, preset: &LightingPreset) -> Result<(), ViewerError> {
        if !preset.is_valid() {
            return Err(ViewerError::Render(format!(
                "lighting out of range: exposure {}, shadow {}",
                preset.exposure, preset.shadow_intensity
            )));
        }
        let mut state = self.lock();
        let context = state
            .contexts
            .get_mut(&ctx)
            .ok_or_else(|| ViewerError::Render(format!("no context {:?}", ctx)))?;
        context.lighting = Some(*preset);
        state.counters.lighting_applied += 1;
        Ok(())
    }

    fn camera(&self, ctx: ContextHandle) -> Option<CameraState> {
        self.lock().contexts.get(&ctx).map(|c| c.camera)
    }

    fn set_camera(&self, ctx: ContextHandle, camera: &CameraState) {
        if let Some(context) = self.lock().contexts.get_mut(&ctx) {
            context.camera = *camera;
        }
    }

    fn start_render_loop(&self, ctx: ContextHandle) {
        let mut state = self.lock();
        if let Some(context) = state.contexts.get_mut(&ctx) {
            if !context.rendering {
                context.rendering = true;
                state.counters.loop_starts += 1;
            }
        }
    }

    fn stop_render_loop(&self, ctx: ContextHandle) {
        let mut state = self.lock();
        if let Some(context) = state.contexts.get_mut(&ctx) {
            if context.rendering {
                context.rendering = false;
                state.counters.loop_stops += 1;
            }
        }
    }

    fn resize(&self, ctx: ContextHandle, size: CanvasSize) {
        if let Some(context) = self.lock().contexts.get_mut(&ctx) {
            context.size = size;
        }
    }

    fn dispose_context(&self, ctx: ContextHandle) {
        let mut state = self.lock();
        if state.contexts.remove(&ctx).is_some() {
            state.counters.contexts_disposed += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use viewer_assets::{encode_glb, ModelAsset};
    use viewer_core::LightingProfile;

    fn asset() -> AssetHandle {
        let model = ModelAsset::from_glb(encode_glb(r#"{"asset":{"version":"2.0"}}"#, None)).unwrap();
        AssetHandle::new(AssetKey::new("rings", "walnut"), "/models/rings-walnut.glb", model)
    }

    #[test]
    fn test_context_lifecycle() {
        let backend = HeadlessBackend::new();
        let id = InstanceId::new("rings#0");
        let ctx = backend.create_context(&id, CanvasSize::new(640.0, 480.0)).unwrap();

        let root = backend.attach_model(ctx, &asset()).unwrap();
        backend.start_render_loop(ctx);
        backend.start_render_loop(ctx);
        assert_eq!(backend.counters().loop_starts, 1);

        let live = backend.context_for(&id).unwrap();
        assert!(live.rendering);
        assert_eq!(live.models, vec![(root, AssetKey::new("rings", "walnut"))]);

        backend.dispose_context(ctx);
        backend.dispose_context(ctx);
        assert_eq!(backend.live_contexts(), 0);
        assert_eq!(backend.counters().contexts_disposed, 1);
    }

    #[test]
    fn test_attach_reframes_camera() {
        let backend = HeadlessBackend::new();
        let ctx = backend
            .create_context(&InstanceId::new("rings#0"), CanvasSize::default())
            .unwrap();
        backend.set_camera(ctx, &CameraState::from_degrees(120.0, 40.0, 6.0));
        backend.attach_model(ctx, &asset()).unwrap();
        assert_eq!(backend.camera(ctx), Some(CameraState::default()));
    }

    #[test]
    fn test_lighting_requires_live_context() {
        let backend = HeadlessBackend::new();
        let preset = LightingProfile::Studio.preset();
        assert!(backend.apply_lighting(ContextHandle(99), &preset).is_err());
    }
}
