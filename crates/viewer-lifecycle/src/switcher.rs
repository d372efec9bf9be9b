//! Model swapping with camera preservation.

use viewer_assets::AssetHandle;
use viewer_core::{CameraFraming, CameraState, LightingPreset, ViewerError};

use crate::backend::{ContextHandle, ModelRoot, RenderBackend};

/// A model that has been attached, lit and framed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwapOutcome {
    pub root: ModelRoot,
    pub camera: CameraState,
}

/// Swaps the model shown in a render context.
///
/// A swap either fully succeeds (new root attached, lighting re-applied,
/// camera restored, old root detached) or leaves the context exactly as it
/// was. The switcher holds no state of its own; the caller owns the camera
/// snapshot between [`snapshot`](VariantSwitcher::snapshot) and
/// [`swap`](VariantSwitcher::swap).
pub struct VariantSwitcher<'a> {
    backend: &'a dyn RenderBackend,
    framing: CameraFraming,
    lighting: LightingPreset,
}

impl<'a> VariantSwitcher<'a> {
    pub fn new(backend: &'a dyn RenderBackend, framing: CameraFraming, lighting: LightingPreset) -> Self {
        Self {
            backend,
            framing,
            lighting,
        }
    }

    /// Read the live camera, falling back to the last known placement.
    pub fn snapshot(&self, ctx: ContextHandle, last_known: CameraState) -> CameraState {
        self.backend.camera(ctx).unwrap_or(last_known)
    }

    /// Attach `asset` in place of `previous` and put the camera back at
    /// `camera`, clamped to the framing bounds.
    pub fn swap(
        &self,
        ctx: ContextHandle,
        previous: Option<ModelRoot>,
        asset: &AssetHandle,
        camera: CameraState,
    ) -> Result<SwapOutcome, ViewerError> {
        let root = self.backend.attach_model(ctx, asset)?;

        if let Err(e) = self.backend.apply_lighting(ctx, &self.lighting) {
            // Attaching may have reframed the camera.
            self.backend.detach_model(ctx, root);
            self.backend.set_camera(ctx, &camera);
            return Err(e);
        }

        let camera = self.framing.clamp(camera);
        self.backend.set_camera(ctx, &camera);

        if let Some(previous) = previous {
            self.backend.detach_model(ctx, previous);
        }

        Ok(SwapOutcome { root, camera })
    }

    /// First placement of a model in a fresh context.
    pub fn present(&self, ctx: ContextHandle, asset: &AssetHandle) -> Result<SwapOutcome, ViewerError> {
        self.swap(ctx, None, asset, self.framing.initial())
    }
}
