//! Maps (product, variant) pairs to asset URLs.

use std::collections::HashSet;
use std::sync::Arc;

use viewer_core::config::AssetPathConfig;
use viewer_core::{AssetKey, ProductId, VariantCatalog, VariantId};

use crate::loader::AssetProbe;

/// Resolves model and poster URLs from a fixed path template.
///
/// Paths follow `/models/{product}-{variant}.{ext}` and
/// `/images/{product}-{variant}-poster.{ext}`, matched case-sensitively.
/// Unknown products resolve to the configured fallback URLs so a viewer
/// always has something to attempt.
#[derive(Clone)]
pub struct AssetResolver {
    paths: AssetPathConfig,
    known_products: HashSet<ProductId>,
    probe: Arc<dyn AssetProbe>,
}

impl AssetResolver {
    /// Create a resolver for the products in `catalog`.
    pub fn new(paths: AssetPathConfig, catalog: &VariantCatalog, probe: Arc<dyn AssetProbe>) -> Self {
        Self {
            paths,
            known_products: catalog.products().cloned().collect(),
            probe,
        }
    }

    /// URL of the 3D model for a product variant.
    pub fn resolve_model_url(&self, product_id: &ProductId, variant_id: &VariantId) -> String {
        if !self.known_products.contains(product_id) {
            return self.with_base(&self.paths.fallback_model);
        }
        self.with_base(&format!(
            "/models/{}-{}.{}",
            product_id, variant_id, self.paths.model_extension
        ))
    }

    /// URL of the poster image for a product variant.
    pub fn resolve_poster_url(&self, product_id: &ProductId, variant_id: &VariantId) -> String {
        if !self.known_products.contains(product_id) {
            return self.with_base(&self.paths.fallback_poster);
        }
        self.with_base(&format!(
            "/images/{}-{}-poster.{}",
            product_id, variant_id, self.paths.poster_extension
        ))
    }

    /// Model URL for an asset key.
    pub fn model_url(&self, key: &AssetKey) -> String {
        self.resolve_model_url(&key.product_id, &key.variant_id)
    }

    /// Poster URL for an asset key.
    pub fn poster_url(&self, key: &AssetKey) -> String {
        self.resolve_poster_url(&key.product_id, &key.variant_id)
    }

    /// Static image shown when a viewer fails.
    pub fn fallback_image_url(&self, key: &AssetKey) -> String {
        self.poster_url(key)
    }

    /// Lightweight existence check. Probe failures count as missing.
    pub async fn asset_exists(&self, url: &str) -> bool {
        match self.probe.exists(url).await {
            Ok(exists) => exists,
            Err(e) => {
                tracing::debug!(url, error = %e, "asset probe failed");
                false
            }
        }
    }

    fn with_base(&self, path: &str) -> String {
        if self.paths.base_path.is_empty() {
            path.to_string()
        } else {
            format!("{}{}", self.paths.base_path.trim_end_matches('/'), path)
        }
    }
}
