//! Run a page of viewers against on-disk assets with a headless renderer.

use std::sync::Arc;

use anyhow::{bail, Result};
use chrono::Utc;
use serde::Serialize;
use viewer_assets::FsAssetLoader;
use viewer_cache::{CacheStats, ResourceCache};
use viewer_core::{InstanceId, Presentation, ViewerState};
use viewer_lifecycle::{
    CanvasSize, HeadlessBackend, IntersectionEntry, LifecycleOrchestrator, ViewerContainer,
    ViewerServices,
};
use viewer_observability::ViewerMetrics;

use super::SimulateArgs;
use crate::context::Context;
use crate::output::{describe_presentation, format_millis, state_badge};

const CANVAS: CanvasSize = CanvasSize {
    width: 640.0,
    height: 480.0,
};

#[derive(Serialize)]
struct InstanceReport {
    id: InstanceId,
    variant: String,
    state: ViewerState,
    presentation: Presentation,
    #[serde(skip_serializing_if = "Option::is_none")]
    notice: Option<String>,
}

#[derive(Serialize)]
struct SwitchReport {
    id: InstanceId,
    variant: String,
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
struct SimulationReport {
    generated_at: String,
    instances: Vec<InstanceReport>,
    switches: Vec<SwitchReport>,
    cache: CacheStats,
    metrics: ViewerMetrics,
}

/// Run the simulate command.
pub async fn run(args: SimulateArgs, ctx: &Context) -> Result<()> {
    if args.slots == 0 {
        bail!("--slots must be at least 1");
    }

    let (catalog, resolver) = args.assets.load(ctx)?;
    if catalog.is_empty() {
        bail!("Catalog has no products");
    }
    let products: Vec<_> = catalog.products().cloned().collect();

    let loader = Arc::new(FsAssetLoader::new(ctx.resolve_path(&args.assets.public_dir)));
    let cache = ResourceCache::new(resolver, loader, &ctx.config.cache);
    let backend = Arc::new(HeadlessBackend::new());
    let services = ViewerServices::new(catalog.clone(), cache, backend.clone(), ctx.config.clone());
    let page = LifecycleOrchestrator::new(services);

    ctx.output.header("Simulating page");

    let mut slot = 0;
    for product in &products {
        for _ in 0..args.slots {
            let id = page.register_viewer(ViewerContainer::new(slot, CANVAS), product.clone())?;
            ctx.output.debug(&format!("registered {}", id));
            slot += 1;
        }
    }

    let entries: Vec<IntersectionEntry> = page
        .instances()
        .into_iter()
        .map(|id| IntersectionEntry::new(id, 1.0, true))
        .collect();
    let entered = page.handle_intersections(&entries);
    ctx.output.info(&format!("{} viewer(s) scrolled into view", entered.len()));

    let spinner = ctx.output.spinner("Loading models...");
    page.settled().await;
    spinner.finish_and_clear();

    let mut switches = Vec::new();
    if args.cycle_variants {
        let spinner = ctx.output.spinner("Cycling variants...");
        for id in page.instances() {
            let Some(viewer) = page.viewer(&id) else {
                continue;
            };
            if viewer.state() != ViewerState::Ready {
                continue;
            }
            let variants = catalog.variants(viewer.product()).unwrap_or_default();
            for variant in variants {
                if variant.variant_id == viewer.variant() {
                    continue;
                }
                spinner.set_message(format!("{} -> {}", id, variant.variant_id));
                let result = page.switch_variant(&id, variant.variant_id.clone()).await;
                switches.push(SwitchReport {
                    id: id.clone(),
                    variant: variant.variant_id.to_string(),
                    ok: result.is_ok(),
                    error: result.err().map(|e| e.to_string()),
                });
            }
        }
        spinner.finish_and_clear();
    }

    let instances: Vec<InstanceReport> = page
        .instances()
        .into_iter()
        .filter_map(|id| page.viewer(&id))
        .map(|viewer| InstanceReport {
            id: viewer.id().clone(),
            variant: viewer.variant().to_string(),
            state: viewer.state(),
            presentation: viewer.presentation(),
            notice: viewer.notice(),
        })
        .collect();

    let report = SimulationReport {
        generated_at: Utc::now().to_rfc3339(),
        instances,
        switches,
        cache: page.cache().stats(),
        metrics: page.metrics(),
    };

    let disposed = page.on_unload();
    ctx.output.debug(&format!("disposed {} viewer(s)", disposed));
    let leaked = backend.live_contexts();
    if leaked > 0 {
        ctx.output.warn(&format!("{} render context(s) still live after unload", leaked));
    }

    if ctx.output.is_json() {
        ctx.output.json(&report);
    } else {
        print_report(&report, ctx);
    }

    let failed = report
        .instances
        .iter()
        .filter(|i| i.state == ViewerState::Error)
        .count();
    if failed > 0 {
        bail!("{} of {} viewer(s) fell back to a static image", failed, report.instances.len());
    }

    Ok(())
}

fn print_report(report: &SimulationReport, ctx: &Context) {
    let widths = [20, 10, 10, 10, 40];
    ctx.output.header("Viewers");
    ctx.output
        .table_row(&["INSTANCE", "VARIANT", "STATE", "READY IN", "SHOWING"], &widths);
    for instance in &report.instances {
        let ready_in = report
            .metrics
            .instances
            .get(instance.id.as_str())
            .and_then(|m| m.time_to_ready_ms)
            .map(format_millis)
            .unwrap_or_else(|| "-".to_string());
        ctx.output.table_row(
            &[
                instance.id.as_str(),
                &instance.variant,
                &state_badge(instance.state),
                &ready_in,
                &describe_presentation(&instance.presentation),
            ],
            &widths,
        );
        if let Some(notice) = &instance.notice {
            ctx.output.list_item(notice);
        }
    }

    if !report.switches.is_empty() {
        ctx.output.header("Variant switches");
        for switch in &report.switches {
            match &switch.error {
                None => ctx.output.success(&format!("{} -> {}", switch.id, switch.variant)),
                Some(e) => ctx.output.warn(&format!("{} -> {}: {}", switch.id, switch.variant, e)),
            }
        }
    }

    ctx.output.header("Cache");
    ctx.output.kv("activity", &report.cache.to_summary());
    ctx.output
        .kv("reuse", &format!("{:.0}%", report.cache.reuse_ratio() * 100.0));

    ctx.output.header("Metrics");
    for line in report.metrics.to_summary().lines() {
        ctx.output.list_item(line);
    }
}
