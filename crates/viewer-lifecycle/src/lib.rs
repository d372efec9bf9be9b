//! Viewer lifecycle management for the storefront 3D product viewer.
//!
//! This crate provides:
//! - `RenderBackend` - The rendering engine seam, plus an in-memory `HeadlessBackend`
//! - `ViewerLifecycle` - Per-instance state machine with timeout fallback and teardown
//! - `VariantSwitcher` - All-or-nothing model swaps that keep the camera in place
//! - `ViewportGate` - Enter/exit events with margin and threshold hysteresis
//! - `LifecycleOrchestrator` - Page-scoped registry routing visibility, resize and unload
//!
//! # Example
//!
//! ```ignore
//! use viewer_lifecycle::{LifecycleOrchestrator, ViewerContainer, ViewerServices, IntersectionEntry};
//!
//! let services = ViewerServices::new(catalog, cache, backend, config);
//! let page = LifecycleOrchestrator::new(services);
//!
//! let id = page.register_viewer(ViewerContainer::new(0, size), "pullup-bar")?;
//! page.handle_intersections(&[IntersectionEntry::new(id.clone(), 0.6, true)]);
//! page.settled().await;
//!
//! page.switch_variant(&id, "chrome").await?;
//! page.on_unload();
//! ```

mod backend;
mod gate;
mod orchestrator;
mod services;
mod switcher;
mod viewer;

pub use backend::*;
pub use gate::*;
pub use orchestrator::*;
pub use services::*;
pub use switcher::*;
pub use viewer::*;
