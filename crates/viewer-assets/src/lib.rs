//! Asset path resolution and loading for the 3D product viewer.
//!
//! This crate provides:
//! - `AssetResolver` - Maps (product, variant) to model and poster URLs
//! - `AssetLoader` / `AssetProbe` - Collaborator traits for fetching assets
//! - `AssetHandle` - Shared, immutable handle to a decoded model
//! - `GlbSummary` - Binary glTF container validation
//! - `FsAssetLoader` / `FsProbe` - Filesystem-backed collaborators

mod fs;
mod glb;
mod loader;
mod resolver;

pub use fs::*;
pub use glb::*;
pub use loader::*;
pub use resolver::*;
