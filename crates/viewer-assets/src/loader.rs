//! Loader and probe collaborator traits.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use viewer_core::{AssetError, AssetKey};

use crate::glb::GlbSummary;

/// A decoded model as delivered by an [`AssetLoader`].
#[derive(Debug, Clone, PartialEq)]
pub struct ModelAsset {
    /// Raw container bytes, handed to the render backend for upload.
    pub data: Vec<u8>,
    /// Parsed container header.
    pub summary: GlbSummary,
}

impl ModelAsset {
    /// Decode raw GLB bytes.
    pub fn from_glb(data: Vec<u8>) -> Result<Self, AssetError> {
        let summary = GlbSummary::parse(&data)?;
        Ok(Self { data, summary })
    }

    pub fn byte_len(&self) -> usize {
        self.data.len()
    }
}

/// Fetches and decodes model files.
#[async_trait]
pub trait AssetLoader: Send + Sync + 'static {
    /// Fetch the asset at `url` and decode it.
    async fn load(&self, url: &str) -> Result<ModelAsset, AssetError>;
}

/// Metadata-only existence check (e.g. a HEAD request).
#[async_trait]
pub trait AssetProbe: Send + Sync + 'static {
    async fn exists(&self, url: &str) -> Result<bool, AssetError>;
}

#[derive(Debug)]
struct LoadedAsset {
    key: AssetKey,
    url: String,
    model: ModelAsset,
}

/// Cheap, cloneable handle to a loaded asset.
///
/// Clones share one allocation; the cache hands the same handle to every
/// viewer showing the key.
#[derive(Clone)]
pub struct AssetHandle(Arc<LoadedAsset>);

impl AssetHandle {
    pub fn new(key: AssetKey, url: impl Into<String>, model: ModelAsset) -> Self {
        Self(Arc::new(LoadedAsset {
            key,
            url: url.into(),
            model,
        }))
    }

    pub fn key(&self) -> &AssetKey {
        &self.0.key
    }

    pub fn url(&self) -> &str {
        &self.0.url
    }

    pub fn model(&self) -> &ModelAsset {
        &self.0.model
    }

    /// Whether two handles point at the same loaded asset.
    pub fn ptr_eq(&self, other: &AssetHandle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for AssetHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetHandle")
            .field("key", &self.0.key)
            .field("url", &self.0.url)
            .field("bytes", &self.0.model.byte_len())
            .finish()
    }
}
