mod common;

use std::time::Duration;

use common::{Behavior, Page};
use viewer_core::{AssetError, Presentation, ViewerError, ViewerState};
use viewer_lifecycle::{CanvasSize, Rect, ViewerContainer, ViewportEvent, PLACEHOLDER_VARIANT};

#[tokio::test(start_paused = true)]
async fn test_unknown_product_loads_fallback_model() {
    let page = Page::new();
    let id = page.register(0, "kettlebell");

    assert_eq!(page.viewer(&id).variant().as_str(), PLACEHOLDER_VARIANT);
    assert_eq!(
        page.orchestrator.presentation(&id),
        Some(Presentation::Poster {
            url: "/images/fallback-poster.webp".into()
        })
    );

    page.enter(&[&id]);
    assert_eq!(page.viewer(&id).settled().await, ViewerState::Ready);
    assert_eq!(page.loader.urls(), vec!["/models/fallback.glb".to_string()]);

    let err = page.orchestrator.switch_variant(&id, "black").await.unwrap_err();
    assert_eq!(err, ViewerError::UnknownProduct("kettlebell".into()));
}

#[tokio::test(start_paused = true)]
async fn test_registering_same_slot_twice_returns_existing_viewer() {
    let page = Page::new();
    let first = page.register(3, "rings");
    let second = page.register(3, "rings");

    assert_eq!(first, second);
    assert_eq!(first.as_str(), "rings#3");
    assert_eq!(page.orchestrator.instances(), vec![first]);
}

#[tokio::test(start_paused = true)]
async fn test_hidden_tab_pauses_everything_and_resumes_only_in_view() {
    let page = Page::new();
    let a = page.ready(0, "pullup-bar").await;
    let b = page.ready(1, "rings").await;
    page.exit(&b);

    page.orchestrator.on_visibility_change(true);
    assert!(!page.viewer(&a).is_rendering());
    assert!(!page.viewer(&b).is_rendering());
    assert_eq!(page.orchestrator.state(&a), Some(ViewerState::Ready));

    page.orchestrator.on_visibility_change(false);
    assert!(page.viewer(&a).is_rendering());
    assert!(!page.viewer(&b).is_rendering());

    // Nothing was freed or refetched along the way.
    assert_eq!(page.backend.live_contexts(), 2);
    assert_eq!(page.loader.calls(), 2);

    let metrics = page.orchestrator.metrics();
    assert_eq!(metrics.instances["pullup-bar#0"].pauses, 1);
    assert_eq!(metrics.instances["rings#1"].pauses, 1);
}

#[tokio::test(start_paused = true)]
async fn test_viewer_registered_while_hidden_waits_for_visibility() {
    let page = Page::new();
    page.orchestrator.on_visibility_change(true);
    let id = page.register(0, "rings");

    page.enter(&[&id]);
    assert_eq!(page.viewer(&id).settled().await, ViewerState::Ready);
    assert!(!page.viewer(&id).is_rendering());

    page.orchestrator.on_visibility_change(false);
    assert!(page.viewer(&id).is_rendering());
}

#[tokio::test(start_paused = true)]
async fn test_resize_reaches_every_live_viewer() {
    let page = Page::new();
    page.loader.set("/models/rings-walnut.glb", Behavior::Hang);
    let a = page.ready(0, "pullup-bar").await;
    let b = page.register(1, "rings");
    page.enter(&[&b]);
    assert_eq!(page.orchestrator.state(&b), Some(ViewerState::Loading));
    let c = page.register(2, "rings");

    let size = CanvasSize::new(800.0, 600.0);
    page.orchestrator.on_resize(|_| Some(size));

    assert_eq!(page.backend.context_for(&a).unwrap().size, size);
    assert_eq!(page.backend.context_for(&b).unwrap().size, size);
    assert_eq!(page.viewer(&c).size(), size);
    assert_eq!(page.orchestrator.state(&c), Some(ViewerState::Idle));
}

#[tokio::test(start_paused = true)]
async fn test_unload_disposes_all_and_closes() {
    let page = Page::new();
    let a = page.ready(0, "pullup-bar").await;
    let b = page.ready(1, "rings").await;
    let viewer_a = page.viewer(&a);

    assert_eq!(page.orchestrator.on_unload(), 2);

    assert!(page.orchestrator.is_closed());
    assert!(page.orchestrator.instances().is_empty());
    assert_eq!(page.orchestrator.state(&b), None);
    assert_eq!(viewer_a.state(), ViewerState::Disposed);
    assert_eq!(page.backend.live_contexts(), 0);
    assert_eq!(page.orchestrator.cache().len(), 0);

    let err = page
        .orchestrator
        .register_viewer(ViewerContainer::new(2, CanvasSize::new(640.0, 480.0)), "rings")
        .unwrap_err();
    assert_eq!(err, ViewerError::Closed);
    assert!(page.orchestrator.handle_intersections(&[]).is_empty());
    assert_eq!(page.orchestrator.on_unload(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_dispose_viewer_removes_it_from_registry() {
    let page = Page::new();
    let id = page.ready(0, "pullup-bar").await;

    assert!(page.orchestrator.dispose_viewer(&id));
    assert!(!page.orchestrator.dispose_viewer(&id));
    assert_eq!(page.orchestrator.state(&id), None);
    assert_eq!(page.backend.live_contexts(), 0);

    let err = page.orchestrator.switch_variant(&id, "chrome").await.unwrap_err();
    assert_eq!(err, ViewerError::UnknownInstance(id.clone()));

    // Late observations for the removed viewer are ignored.
    page.enter(&[&id]);
    assert_eq!(page.loader.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_geometry_within_root_margin_enters() {
    let page = Page::new();
    let near = page.register(0, "pullup-bar");
    let far = page.register(1, "rings");
    let viewport = Rect::new(0.0, 0.0, 1280.0, 800.0);

    // 100 of 400 px fall inside the 200 px margin below the fold.
    let events = page.orchestrator.handle_geometry(
        viewport,
        &[
            (near.clone(), Rect::new(0.0, 900.0, 640.0, 400.0)),
            (far.clone(), Rect::new(0.0, 3000.0, 640.0, 400.0)),
        ],
    );

    assert_eq!(events, vec![ViewportEvent::Enter(near.clone())]);
    assert_eq!(page.orchestrator.state(&near), Some(ViewerState::Loading));
    assert_eq!(page.orchestrator.state(&far), Some(ViewerState::Idle));
}

#[tokio::test(start_paused = true)]
async fn test_sibling_failure_is_isolated() {
    let page = Page::new();
    page.loader.set(
        "/models/pullup-bar-black.glb",
        Behavior::Fail(
            AssetError::NotFound {
                url: "/models/pullup-bar-black.glb".into(),
            },
            Duration::from_millis(20),
        ),
    );
    let a = page.register(0, "pullup-bar");
    let b = page.register(1, "rings");

    page.enter(&[&a, &b]);
    page.orchestrator.settled().await;

    assert_eq!(page.orchestrator.state(&a), Some(ViewerState::Error));
    assert_eq!(page.orchestrator.state(&b), Some(ViewerState::Ready));
    assert!(page.orchestrator.presentation(&a).unwrap().is_fallback());
    assert_eq!(page.backend.live_contexts(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_metrics_record_time_to_ready() {
    let page = Page::new();
    let id = page.ready(0, "pullup-bar").await;
    page.orchestrator.switch_variant(&id, "chrome").await.unwrap();

    let metrics = page.orchestrator.metrics();
    let m = &metrics.instances["pullup-bar#0"];
    assert_eq!(m.product_id, "pullup-bar");
    assert_eq!(m.time_to_ready_ms, Some(100));
    assert_eq!(m.attempts, 1);
    assert_eq!(m.switches_ok, 1);
    assert!(m.failures.is_empty());

    let stats = page.orchestrator.cache().stats();
    assert_eq!(stats.loads_started, 2);
    assert_eq!(stats.loads_succeeded, 2);
}
