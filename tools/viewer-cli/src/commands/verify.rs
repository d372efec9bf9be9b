//! Check that every catalog variant has a decodable model and a poster.

use anyhow::{bail, Result};
use serde::Serialize;
use viewer_assets::{AssetLoader, FsAssetLoader};
use viewer_core::{AssetKey, ProductId};

use super::VerifyArgs;
use crate::context::Context;
use crate::output::format_bytes;

#[derive(Serialize)]
struct VariantReport {
    key: String,
    model_url: String,
    poster_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    model_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    meshes: Option<usize>,
    problems: Vec<String>,
}

/// Run the verify command.
pub async fn run(args: VerifyArgs, ctx: &Context) -> Result<()> {
    let (catalog, resolver) = args.assets.load(ctx)?;
    let loader = FsAssetLoader::new(ctx.resolve_path(&args.assets.public_dir));

    let keys: Vec<AssetKey> = match &args.product {
        Some(product) => {
            let product = ProductId::new(product.as_str());
            if !catalog.contains_product(&product) {
                bail!("Unknown product {}", product);
            }
            catalog
                .keys()
                .into_iter()
                .filter(|k| k.product_id == product)
                .collect()
        }
        None => catalog.keys(),
    };

    ctx.output.header(&format!("Verifying {} variant(s)", keys.len()));
    let pb = ctx.output.progress(keys.len() as u64, "checking assets");

    let mut reports = Vec::with_capacity(keys.len());
    for key in &keys {
        pb.set_message(key.to_string());
        let model_url = resolver.model_url(key);
        let poster_url = resolver.poster_url(key);
        let mut report = VariantReport {
            key: key.to_string(),
            model_url: model_url.clone(),
            poster_url: poster_url.clone(),
            model_bytes: None,
            meshes: None,
            problems: Vec::new(),
        };

        match loader.load(&model_url).await {
            Ok(model) => {
                report.model_bytes = Some(model.byte_len() as u64);
                report.meshes = Some(model.summary.mesh_count);
            }
            Err(e) => report.problems.push(format!("model: {}", e)),
        }
        if !resolver.asset_exists(&poster_url).await {
            report.problems.push(format!("poster missing: {}", poster_url));
        }

        reports.push(report);
        pb.inc(1);
    }
    pb.finish_and_clear();

    let mut fallbacks_missing = Vec::new();
    for url in [&ctx.config.assets.fallback_model, &ctx.config.assets.fallback_poster] {
        if !resolver.asset_exists(url).await {
            fallbacks_missing.push(url.clone());
        }
    }

    let failed = reports.iter().filter(|r| !r.problems.is_empty()).count();

    if ctx.output.is_json() {
        ctx.output.json(&serde_json::json!({
            "variants": reports,
            "failed": failed,
            "fallbacks_missing": fallbacks_missing,
        }));
    } else {
        for report in &reports {
            if report.problems.is_empty() {
                let size = report.model_bytes.map(format_bytes).unwrap_or_default();
                ctx.output
                    .success(&format!("{} ({}, {} mesh(es))", report.key, size, report.meshes.unwrap_or(0)));
            } else {
                for problem in &report.problems {
                    ctx.output.error(&format!("{}: {}", report.key, problem));
                }
            }
        }
        for url in &fallbacks_missing {
            ctx.output.warn(&format!("Fallback asset missing: {}", url));
        }
    }

    if failed > 0 {
        bail!("{} of {} variant(s) have missing or invalid assets", failed, reports.len());
    }

    ctx.output.success("All catalog assets present");
    Ok(())
}
