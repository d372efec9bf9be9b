//! Core types for the storefront 3D product viewer.
//!
//! This crate provides the shared vocabulary used by every viewer crate:
//!
//! - **Identity**: `ProductId`, `VariantId`, `InstanceId`, `AssetKey`
//! - **Catalog**: `VariantCatalog` with exactly one default variant per product
//! - **Scene settings**: `CameraState`, `CameraFraming`, `LightingPreset`
//! - **Configuration**: `ViewerConfig` loaded from TOML or JSON
//! - **Lifecycle**: `ViewerState`, `Presentation`, `ViewerObserver`
//! - **Errors**: `AssetError`, `ViewerError`
//!
//! # Example
//!
//! ```rust,ignore
//! use viewer_core::prelude::*;
//!
//! let catalog = VariantCatalog::from_toml_str(include_str!("catalog.toml"))?;
//! let key = catalog.default_key(&ProductId::new("pullup-bar"))?;
//! assert_eq!(key.to_string(), "pullup-bar-black");
//! ```

pub mod camera;
pub mod catalog;
pub mod config;
pub mod error;
pub mod ids;
pub mod key;
pub mod lifecycle;
pub mod lighting;

pub use camera::{CameraFraming, CameraState};
pub use catalog::{CatalogError, Variant, VariantCatalog};
pub use config::{ConfigError, ViewerConfig};
pub use error::{AssetError, ViewerError};
pub use ids::*;
pub use key::AssetKey;
pub use lifecycle::{LoadKind, Presentation, ViewerObserver, ViewerState};
pub use lighting::{Environment, LightingPreset, LightingProfile};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::camera::{CameraFraming, CameraState};
    pub use crate::catalog::{CatalogError, Variant, VariantCatalog};
    pub use crate::config::{
        AssetPathConfig, CacheConfig, CameraConfig, ConfigError, LightingConfig,
        TimeoutConfig, ViewerConfig, ViewportConfig,
    };
    pub use crate::error::{AssetError, ViewerError};
    pub use crate::ids::*;
    pub use crate::key::AssetKey;
    pub use crate::lifecycle::{LoadKind, Presentation, ViewerObserver, ViewerState};
    pub use crate::lighting::{Environment, LightingPreset, LightingProfile};
}
