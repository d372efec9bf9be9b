//! Asset cache keys.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ids::{ProductId, VariantId};

/// A (product, variant) pair identifying one loadable 3D asset.
///
/// Exact string match on both parts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssetKey {
    /// Product the asset belongs to.
    pub product_id: ProductId,
    /// Color/material variant of the product.
    pub variant_id: VariantId,
}

impl AssetKey {
    /// Create a new asset key.
    pub fn new(product_id: impl Into<ProductId>, variant_id: impl Into<VariantId>) -> Self {
        Self {
            product_id: product_id.into(),
            variant_id: variant_id.into(),
        }
    }

    /// Same product, different variant.
    pub fn with_variant(&self, variant_id: impl Into<VariantId>) -> Self {
        Self {
            product_id: self.product_id.clone(),
            variant_id: variant_id.into(),
        }
    }
}

impl fmt::Display for AssetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.product_id, self.variant_id)
    }
}
