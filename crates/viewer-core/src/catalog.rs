//! Variant catalog: which colors/materials each product ships in.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ids::{ProductId, VariantId};
use crate::key::AssetKey;

/// Catalog validation and loading errors.
#[derive(Error, Debug)]
pub enum CatalogError {
    /// Product declared without variants.
    #[error("Product {0} has no variants")]
    NoVariants(ProductId),

    /// Product has zero or several default variants.
    #[error("Product {product} must have exactly one default variant, found {found}")]
    DefaultCount { product: ProductId, found: usize },

    /// The same variant id appears twice for one product.
    #[error("Duplicate variant {variant} for product {product}")]
    DuplicateVariant { product: ProductId, variant: VariantId },

    /// The same product appears twice.
    #[error("Duplicate product: {0}")]
    DuplicateProduct(ProductId),

    /// Swatch is not a `#rrggbb` color.
    #[error("Invalid swatch color {color} for {product}/{variant}")]
    InvalidSwatch {
        product: ProductId,
        variant: VariantId,
        color: String,
    },

    /// Catalog file could not be read.
    #[error("Failed to read catalog {path}: {message}")]
    Io { path: String, message: String },

    /// Catalog file could not be parsed.
    #[error("Failed to parse catalog: {0}")]
    Parse(String),
}

/// A selectable material/color configuration of a product's model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    /// Variant identifier, used in asset paths.
    #[serde(rename = "id")]
    pub variant_id: VariantId,
    /// Label shown on the swatch button.
    pub display_name: String,
    /// Swatch color as `#rrggbb`.
    #[serde(rename = "swatch")]
    pub swatch_color: String,
    /// Loaded on first intersection.
    #[serde(rename = "default", default)]
    pub default_flag: bool,
}

impl Variant {
    /// Create a non-default variant.
    pub fn new(
        variant_id: impl Into<VariantId>,
        display_name: impl Into<String>,
        swatch_color: impl Into<String>,
    ) -> Self {
        Self {
            variant_id: variant_id.into(),
            display_name: display_name.into(),
            swatch_color: swatch_color.into(),
            default_flag: false,
        }
    }

    /// Mark as the product's default variant.
    pub fn as_default(mut self) -> Self {
        self.default_flag = true;
        self
    }
}

/// On-disk catalog shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    products: Vec<ProductEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ProductEntry {
    id: ProductId,
    variants: Vec<Variant>,
}

/// Static mapping from product to its ordered variant list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariantCatalog {
    products: BTreeMap<ProductId, Vec<Variant>>,
}

impl VariantCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a product, validating its variant list.
    pub fn insert(
        &mut self,
        product_id: impl Into<ProductId>,
        variants: Vec<Variant>,
    ) -> Result<(), CatalogError> {
        let product_id = product_id.into();
        if self.products.contains_key(&product_id) {
            return Err(CatalogError::DuplicateProduct(product_id));
        }
        validate_variants(&product_id, &variants)?;
        self.products.insert(product_id, variants);
        Ok(())
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with_product(
        mut self,
        product_id: impl Into<ProductId>,
        variants: Vec<Variant>,
    ) -> Result<Self, CatalogError> {
        self.insert(product_id, variants)?;
        Ok(self)
    }

    /// Parse a TOML catalog.
    pub fn from_toml_str(content: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile =
            toml::from_str(content).map_err(|e| CatalogError::Parse(e.to_string()))?;
        Self::from_file(file)
    }

    /// Parse a JSON catalog.
    pub fn from_json_str(content: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile =
            serde_json::from_str(content).map_err(|e| CatalogError::Parse(e.to_string()))?;
        Self::from_file(file)
    }

    /// Load a catalog file; `.json` is parsed as JSON, anything else as TOML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| CatalogError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        if path.extension().is_some_and(|ext| ext == "json") {
            Self::from_json_str(&content)
        } else {
            Self::from_toml_str(&content)
        }
    }

    fn from_file(file: CatalogFile) -> Result<Self, CatalogError> {
        let mut catalog = Self::new();
        for entry in file.products {
            catalog.insert(entry.id, entry.variants)?;
        }
        Ok(catalog)
    }

    /// Whether the product is known.
    pub fn contains_product(&self, product_id: &ProductId) -> bool {
        self.products.contains_key(product_id)
    }

    /// Ordered variants of a product.
    pub fn variants(&self, product_id: &ProductId) -> Option<&[Variant]> {
        self.products.get(product_id).map(|v| v.as_slice())
    }

    /// Look up one variant.
    pub fn variant(&self, product_id: &ProductId, variant_id: &VariantId) -> Option<&Variant> {
        self.variants(product_id)?
            .iter()
            .find(|v| &v.variant_id == variant_id)
    }

    /// The variant loaded on first intersection.
    pub fn default_variant(&self, product_id: &ProductId) -> Option<&Variant> {
        self.variants(product_id)?.iter().find(|v| v.default_flag)
    }

    /// Asset key of the product's default variant.
    pub fn default_key(&self, product_id: &ProductId) -> Option<AssetKey> {
        self.default_variant(product_id)
            .map(|v| AssetKey::new(product_id.clone(), v.variant_id.clone()))
    }

    /// All product ids, in stable order.
    pub fn products(&self) -> impl Iterator<Item = &ProductId> {
        self.products.keys()
    }

    /// Every (product, variant) key in the catalog.
    pub fn keys(&self) -> Vec<AssetKey> {
        self.products
            .iter()
            .flat_map(|(product, variants)| {
                variants
                    .iter()
                    .map(move |v| AssetKey::new(product.clone(), v.variant_id.clone()))
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

fn validate_variants(product_id: &ProductId, variants: &[Variant]) -> Result<(), CatalogError> {
    if variants.is_empty() {
        return Err(CatalogError::NoVariants(product_id.clone()));
    }

    let defaults = variants.iter().filter(|v| v.default_flag).count();
    if defaults != 1 {
        return Err(CatalogError::DefaultCount {
            product: product_id.clone(),
            found: defaults,
        });
    }

    let mut seen = HashSet::new();
    for variant in variants {
        if !seen.insert(&variant.variant_id) {
            return Err(CatalogError::DuplicateVariant {
                product: product_id.clone(),
                variant: variant.variant_id.clone(),
            });
        }
        if !is_hex_color(&variant.swatch_color) {
            return Err(CatalogError::InvalidSwatch {
                product: product_id.clone(),
                variant: variant.variant_id.clone(),
                color: variant.swatch_color.clone(),
            });
        }
    }

    Ok(())
}

fn is_hex_color(s: &str) -> bool {
    s.len() == 7 && s.starts_with('#') && s[1..].chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r##"
[[products]]
id = "pullup-bar"

[[products.variants]]
id = "black"
display_name = "Matte Black"
swatch = "#1a1a1a"
default = true

[[products.variants]]
id = "steel"
display_name = "Brushed Steel"
swatch = "#9ea7ad"

[[products]]
id = "rings"

[[products.variants]]
id = "walnut"
display_name = "Walnut"
swatch = "#5c3a21"
default = true
"##;

    #[test]
    fn test_parse_toml_catalog() {
        let catalog = VariantCatalog::from_toml_str(CATALOG).unwrap();
        assert_eq!(catalog.len(), 2);

        let bar = ProductId::new("pullup-bar");
        let variants = catalog.variants(&bar).unwrap();
        assert_eq!(variants.len(), 2);
        assert_eq!(variants[0].variant_id.as_str(), "black");
        assert_eq!(
            catalog.default_key(&bar),
            Some(AssetKey::new("pullup-bar", "black"))
        );
    }

    #[test]
    fn test_keys_cover_every_variant() {
        let catalog = VariantCatalog::from_toml_str(CATALOG).unwrap();
        let keys = catalog.keys();
        assert_eq!(keys.len(), 3);
        assert!(keys.contains(&AssetKey::new("pullup-bar", "steel")));
    }

    #[test]
    fn test_requires_exactly_one_default() {
        let err = VariantCatalog::new()
            .with_product(
                "parallettes",
                vec![Variant::new("oak", "Oak", "#c8a165"), Variant::new("ash", "Ash", "#e0d5c1")],
            )
            .unwrap_err();
        assert!(matches!(err, CatalogError::DefaultCount { found: 0, .. }));

        let err = VariantCatalog::new()
            .with_product(
                "parallettes",
                vec![
                    Variant::new("oak", "Oak", "#c8a165").as_default(),
                    Variant::new("ash", "Ash", "#e0d5c1").as_default(),
                ],
            )
            .unwrap_err();
        assert!(matches!(err, CatalogError::DefaultCount { found: 2, .. }));
    }

    #[test]
    fn test_rejects_duplicate_variant() {
        let err = VariantCatalog::new()
            .with_product(
                "rings",
                vec![
                    Variant::new("walnut", "Walnut", "#5c3a21").as_default(),
                    Variant::new("walnut", "Walnut again", "#5c3a21"),
                ],
            )
            .unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateVariant { .. }));
    }

    #[test]
    fn test_rejects_bad_swatch() {
        let err = VariantCatalog::new()
            .with_product("rings", vec![Variant::new("walnut", "Walnut", "brown").as_default()])
            .unwrap_err();
        assert!(matches!(err, CatalogError::InvalidSwatch { .. }));
    }

    #[test]
    fn test_parse_json_catalog() {
        let json = r##"{"products":[{"id":"dip-station","variants":[{"id":"red","display_name":"Red","swatch":"#aa2222","default":true}]}]}"##;
        let catalog = VariantCatalog::from_json_str(json).unwrap();
        assert!(catalog.contains_product(&ProductId::new("dip-station")));
    }
}
