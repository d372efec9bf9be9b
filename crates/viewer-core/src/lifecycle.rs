//! Viewer lifecycle states and observation.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ids::InstanceId;

/// Lifecycle state of one viewer instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ViewerState {
    /// Registered, no GPU resources, poster shown.
    #[default]
    Idle,
    /// An asset load is in flight.
    Loading,
    /// Model shown, render loop owned by the instance.
    Ready,
    /// Load failed; fallback image and retry shown.
    Error,
    /// Terminal. All resources released.
    Disposed,
}

impl ViewerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViewerState::Idle => "idle",
            ViewerState::Loading => "loading",
            ViewerState::Ready => "ready",
            ViewerState::Error => "error",
            ViewerState::Disposed => "disposed",
        }
    }

    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(&self, next: ViewerState) -> bool {
        use ViewerState::*;
        match (self, next) {
            (Disposed, _) => false,
            (_, Disposed) => true,
            (Idle, Loading) | (Error, Loading) => true,
            (Loading, Ready) | (Loading, Error) => true,
            (Ready, Loading) => true,
            _ => false,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ViewerState::Disposed)
    }
}

impl fmt::Display for ViewerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which kind of attempt put the viewer into `Loading`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadKind {
    /// First load after intersection, or a manual retry.
    Initial,
    /// Swapping to another variant of the same product.
    VariantSwitch,
}

impl LoadKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadKind::Initial => "initial",
            LoadKind::VariantSwitch => "variant_switch",
        }
    }
}

/// What the storefront should show in the viewer's container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Presentation {
    /// Static poster image, before any 3D work.
    Poster { url: String },
    /// Loading affordance over the poster.
    Loading { poster_url: String },
    /// Live 3D canvas.
    Canvas,
    /// 2D fallback with a manual retry button.
    Fallback { image_url: String, can_retry: bool },
    /// Nothing; the viewer is gone.
    Removed,
}

impl Presentation {
    pub fn is_fallback(&self) -> bool {
        matches!(self, Presentation::Fallback { .. })
    }
}

/// Observer for viewer lifecycle events.
pub trait ViewerObserver: Send + Sync {
    /// Called after every state transition.
    fn on_transition(&self, id: &InstanceId, from: ViewerState, to: ViewerState, elapsed: Duration);

    /// Called when a transient notice is shown (e.g. a failed variant switch).
    fn on_notice(&self, _id: &InstanceId, _message: &str) {}
}
