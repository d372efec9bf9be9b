//! Print asset URLs for a product variant.

use anyhow::{bail, Result};
use serde::Serialize;
use viewer_core::{AssetKey, ProductId, VariantId};

use super::ResolveArgs;
use crate::context::Context;

#[derive(Serialize)]
struct Resolved {
    product: String,
    variant: String,
    model_url: String,
    poster_url: String,
    model_exists: bool,
    poster_exists: bool,
}

/// Run the resolve command.
pub async fn run(args: ResolveArgs, ctx: &Context) -> Result<()> {
    let (catalog, resolver) = args.assets.load(ctx)?;
    let product = ProductId::new(args.product);

    let variant = match args.variant {
        Some(variant) => {
            let variant = VariantId::new(variant);
            if catalog.contains_product(&product) && catalog.variant(&product, &variant).is_none() {
                bail!("Unknown variant {} for product {}", variant, product);
            }
            variant
        }
        None => match catalog.default_variant(&product) {
            Some(v) => v.variant_id.clone(),
            None => bail!("Unknown product {}; pass a variant to see fallback URLs", product),
        },
    };

    if !catalog.contains_product(&product) {
        ctx.output.warn(&format!("{} is not in the catalog; showing fallback URLs", product));
    }

    let key = AssetKey::new(product, variant);
    let model_url = resolver.model_url(&key);
    let poster_url = resolver.poster_url(&key);
    let resolved = Resolved {
        product: key.product_id.to_string(),
        variant: key.variant_id.to_string(),
        model_exists: resolver.asset_exists(&model_url).await,
        poster_exists: resolver.asset_exists(&poster_url).await,
        model_url,
        poster_url,
    };

    if ctx.output.is_json() {
        ctx.output.json(&resolved);
        return Ok(());
    }

    ctx.output.header(&format!("{} / {}", resolved.product, resolved.variant));
    ctx.output.kv("model", &with_presence(&resolved.model_url, resolved.model_exists));
    ctx.output.kv("poster", &with_presence(&resolved.poster_url, resolved.poster_exists));

    Ok(())
}

fn with_presence(url: &str, exists: bool) -> String {
    if exists {
        url.to_string()
    } else {
        format!("{} (missing)", url)
    }
}
