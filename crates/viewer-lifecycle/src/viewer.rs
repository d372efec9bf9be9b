//! Per-instance viewer state machine.
//!
//! ```text
//! Idle ──enter──▶ Loading ──ok──▶ Ready ──switch──▶ Loading ──▶ Ready
//!                    │                                (ok or rolled back)
//!                    └─fail/timeout─▶ Error ──retry──▶ Loading
//! any ──dispose──▶ Disposed
//! ```
//!
//! Each load runs as its own task and carries the attempt epoch it was
//! started under. A completion whose epoch no longer matches (timed out,
//! superseded, disposed) changes nothing.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::{self, error::Elapsed, Instant};
use viewer_cache::LoadResult;
use viewer_core::{
    AssetKey, CameraState, InstanceId, LoadKind, Presentation, ProductId, VariantId, ViewerError,
    ViewerState,
};
use viewer_observability::StructuredLogger;

use crate::backend::{CanvasSize, ContextHandle, ModelRoot};
use crate::services::ViewerServices;
use crate::switcher::VariantSwitcher;

type Attempt = JoinHandle<Result<(), ViewerError>>;

enum Event {
    Transition {
        from: ViewerState,
        to: ViewerState,
        elapsed: Duration,
    },
    Notice(String),
}

/// Handle to one on-page viewer.
///
/// Cheap to clone; all clones drive the same instance.
#[derive(Clone)]
pub struct ViewerLifecycle {
    inner: Arc<Inner>,
}

struct Inner {
    id: InstanceId,
    product: ProductId,
    services: Arc<ViewerServices>,
    state: Mutex<InstanceState>,
    state_tx: watch::Sender<ViewerState>,
}

struct InstanceState {
    state: ViewerState,
    since: Instant,
    variant: VariantId,
    camera: CameraState,
    size: CanvasSize,

    // Exclusively owned GPU resources.
    context: Option<ContextHandle>,
    root: Option<ModelRoot>,
    rendering: bool,

    // Cache references: the key on screen and the key being fetched.
    active_key: Option<AssetKey>,
    pending_key: Option<AssetKey>,

    epoch: u64,
    attempt: Option<AbortHandle>,
    load_kind: LoadKind,
    load_started: Option<Instant>,

    in_view: bool,
    page_hidden: bool,
    presentation: Presentation,
    notice: Option<String>,
    logger: StructuredLogger,
    events: Vec<Event>,
}

impl ViewerLifecycle {
    /// Register a viewer in `Idle`, showing the poster for `variant`.
    pub fn new(
        id: InstanceId,
        product: ProductId,
        variant: VariantId,
        size: CanvasSize,
        services: Arc<ViewerServices>,
    ) -> Self {
        let poster = services.cache.resolver().resolve_poster_url(&product, &variant);
        let mut logger = StructuredLogger::new(id.clone()).with_product(product.clone());
        logger.set_variant(variant.clone());
        let (state_tx, _) = watch::channel(ViewerState::Idle);

        Self {
            inner: Arc::new(Inner {
                id,
                product,
                state: Mutex::new(InstanceState {
                    state: ViewerState::Idle,
                    since: Instant::now(),
                    variant,
                    camera: services.framing().initial(),
                    size,
                    context: None,
                    root: None,
                    rendering: false,
                    active_key: None,
                    pending_key: None,
                    epoch: 0,
                    attempt: None,
                    load_kind: LoadKind::Initial,
                    load_started: None,
                    in_view: false,
                    page_hidden: false,
                    presentation: Presentation::Poster { url: poster },
                    notice: None,
                    logger,
                    events: Vec::new(),
                }),
                services,
                state_tx,
            }),
        }
    }

    pub fn id(&self) -> &InstanceId {
        &self.inner.id
    }

    pub fn product(&self) -> &ProductId {
        &self.inner.product
    }

    pub fn state(&self) -> ViewerState {
        self.lock().state
    }

    /// The variant on screen (or about to be, before the first load).
    pub fn variant(&self) -> VariantId {
        self.lock().variant.clone()
    }

    pub fn presentation(&self) -> Presentation {
        self.lock().presentation.clone()
    }

    /// Message left by the last failed variant switch.
    pub fn notice(&self) -> Option<String> {
        self.lock().notice.clone()
    }

    pub fn clear_notice(&self) {
        self.lock().notice = None;
    }

    pub fn is_rendering(&self) -> bool {
        self.lock().rendering
    }

    pub fn is_in_view(&self) -> bool {
        self.lock().in_view
    }

    /// Last known container size.
    pub fn size(&self) -> CanvasSize {
        self.lock().size
    }

    /// Live camera placement.
    pub fn camera(&self) -> CameraState {
        let st = self.lock();
        st.context
            .and_then(|ctx| self.inner.services.backend.camera(ctx))
            .unwrap_or(st.camera)
    }

    /// Watch state changes.
    pub fn subscribe(&self) -> watch::Receiver<ViewerState> {
        self.inner.state_tx.subscribe()
    }

    /// Wait until no load is in flight and return the state reached.
    pub async fn settled(&self) -> ViewerState {
        let mut rx = self.subscribe();
        let settled = rx
            .wait_for(|state| *state != ViewerState::Loading)
            .await
            .map(|state| *state);
        settled.unwrap_or(ViewerState::Disposed)
    }

    /// The container reached the viewport.
    ///
    /// Starts the first load from `Idle`, resumes rendering when `Ready`,
    /// and does nothing otherwise.
    pub fn on_enter(&self) {
        self.with_state(|st| {
            if st.state == ViewerState::Disposed {
                return;
            }
            st.in_view = true;
            match st.state {
                ViewerState::Idle => {
                    // Failures are already reflected in the Error state.
                    let _ = self.begin_initial(st);
                }
                ViewerState::Loading | ViewerState::Ready => self.sync_render_loop(st),
                ViewerState::Error | ViewerState::Disposed => {}
            }
        });
    }

    /// The container left the viewport. Rendering pauses; nothing is freed.
    pub fn on_exit(&self) {
        self.with_state(|st| {
            if st.state == ViewerState::Disposed {
                return;
            }
            st.in_view = false;
            self.sync_render_loop(st);
        });
    }

    /// The page was hidden or shown.
    pub fn on_page_visibility(&self, hidden: bool) {
        self.with_state(|st| {
            if st.state == ViewerState::Disposed {
                return;
            }
            st.page_hidden = hidden;
            self.sync_render_loop(st);
        });
    }

    /// The container was resized.
    pub fn resize(&self, size: CanvasSize) {
        self.with_state(|st| {
            if st.state == ViewerState::Disposed {
                return;
            }
            st.size = size;
            if let Some(ctx) = st.context {
                self.inner.services.backend.resize(ctx, size);
            }
        });
    }

    /// Move the camera (user orbit). Returns the placement after clamping.
    pub fn set_camera(&self, camera: CameraState) -> Result<CameraState, ViewerError> {
        self.with_state(|st| {
            let ctx = match (st.state, st.context) {
                (ViewerState::Ready, Some(ctx)) => ctx,
                (state, _) => return Err(self.not_ready(state, ViewerState::Ready)),
            };
            let camera = self.inner.services.framing().clamp(camera);
            self.inner.services.backend.set_camera(ctx, &camera);
            st.camera = camera;
            Ok(camera)
        })
    }

    /// Load again after a failure. Cached failures still in cool-down are
    /// replayed without a fetch. Allowed even when the fallback hides the
    /// retry button.
    pub async fn retry(&self) -> Result<(), ViewerError> {
        let attempt = self.with_state(|st| match st.state {
            ViewerState::Error => self.begin_initial(st),
            state => Err(self.not_ready(state, ViewerState::Error)),
        })?;
        self.join(attempt).await
    }

    /// Show another variant of the same product.
    ///
    /// All-or-nothing: on failure the previous model and camera stay, a
    /// notice is set, and the viewer returns to `Ready`. A newer switch
    /// supersedes one still in flight. Switching to the variant already
    /// shown is a no-op.
    pub async fn switch_variant(&self, variant: impl Into<VariantId>) -> Result<(), ViewerError> {
        let variant = variant.into();
        let attempt = self.with_state(|st| self.begin_switch(st, variant))?;
        match attempt {
            Some(attempt) => self.join(attempt).await,
            None => Ok(()),
        }
    }

    /// Free everything and enter `Disposed`.
    ///
    /// In-flight fetches keep running in the cache; only this instance
    /// detaches. Returns `false` if already disposed.
    pub fn dispose(&self) -> bool {
        self.with_state(|st| {
            if st.state == ViewerState::Disposed {
                return false;
            }

            self.cancel_attempt(st);
            if let Some(key) = st.active_key.take() {
                self.inner.services.cache.release(&key);
            }
            self.release_gpu(st);
            st.in_view = false;
            st.notice = None;
            self.transition(st, ViewerState::Disposed);
            st.presentation = Presentation::Removed;
            self.inner.services.metrics.record_disposed(&self.inner.id);
            st.logger.info("viewer disposed");
            true
        })
    }

    fn lock(&self) -> MutexGuard<'_, InstanceState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` under the lock, then notify the observer outside it.
    fn with_state<R>(&self, f: impl FnOnce(&mut InstanceState) -> R) -> R {
        let (result, events) = {
            let mut st = self.lock();
            let result = f(&mut st);
            (result, std::mem::take(&mut st.events))
        };
        self.emit(events);
        result
    }

    fn emit(&self, events: Vec<Event>) {
        let Some(observer) = &self.inner.services.observer else {
            return;
        };
        for event in events {
            match event {
                Event::Transition { from, to, elapsed } => {
                    observer.on_transition(&self.inner.id, from, to, elapsed)
                }
                Event::Notice(message) => observer.on_notice(&self.inner.id, &message),
            }
        }
    }

    fn transition(&self, st: &mut InstanceState, to: ViewerState) {
        let from = st.state;
        debug_assert!(from.can_transition_to(to), "illegal transition {} -> {}", from, to);

        let now = Instant::now();
        let elapsed = now.duration_since(st.since);
        st.state = to;
        st.since = now;
        self.inner.state_tx.send_replace(to);

        st.logger
            .debug_builder("state transition")
            .field("from", from.as_str())
            .field("to", to.as_str())
            .duration_ms("elapsed_ms", elapsed)
            .emit();
        st.events.push(Event::Transition { from, to, elapsed });
    }

    fn not_ready(&self, state: ViewerState, expected: ViewerState) -> ViewerError {
        if state == ViewerState::Disposed {
            return ViewerError::Disposed(self.inner.id.clone());
        }
        ViewerError::NotReady {
            id: self.inner.id.clone(),
            state,
            expected,
        }
    }

    fn stale(&self, st: &InstanceState) -> ViewerError {
        if st.state == ViewerState::Disposed {
            ViewerError::Disposed(self.inner.id.clone())
        } else {
            ViewerError::Superseded
        }
    }

    fn switcher(&self) -> VariantSwitcher<'_> {
        let services = &self.inner.services;
        VariantSwitcher::new(services.backend.as_ref(), services.framing(), services.lighting())
    }

    /// Render only with a model attached, in view, on a visible page.
    fn sync_render_loop(&self, st: &mut InstanceState) {
        let Some(ctx) = st.context else {
            return;
        };
        let should_render = st.root.is_some()
            && st.in_view
            && !st.page_hidden
            && matches!(st.state, ViewerState::Ready | ViewerState::Loading);

        if should_render && !st.rendering {
            self.inner.services.backend.start_render_loop(ctx);
            st.rendering = true;
        } else if !should_render && st.rendering {
            self.inner.services.backend.stop_render_loop(ctx);
            st.rendering = false;
            self.inner.services.metrics.record_pause(&self.inner.id);
        }
    }

    fn release_gpu(&self, st: &mut InstanceState) {
        let backend = &self.inner.services.backend;
        let Some(ctx) = st.context.take() else {
            return;
        };
        if st.rendering {
            backend.stop_render_loop(ctx);
            st.rendering = false;
        }
        if let Some(root) = st.root.take() {
            backend.detach_model(ctx, root);
        }
        backend.dispose_context(ctx);
    }

    /// Abort the in-flight attempt and return its cache reference.
    fn cancel_attempt(&self, st: &mut InstanceState) {
        st.epoch += 1;
        if let Some(attempt) = st.attempt.take() {
            attempt.abort();
        }
        if let Some(key) = st.pending_key.take() {
            self.inner.services.cache.release(&key);
        }
    }

    async fn join(&self, attempt: Attempt) -> Result<(), ViewerError> {
        match attempt.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => match self.state() {
                ViewerState::Disposed => Err(ViewerError::Disposed(self.inner.id.clone())),
                _ => Err(ViewerError::Superseded),
            },
            Err(e) => Err(ViewerError::Render(e.to_string())),
        }
    }

    /// Spawn a load of `key` bounded by `budget`; `finish` runs on the
    /// outcome if the instance is still alive.
    fn spawn_attempt(
        &self,
        st: &mut InstanceState,
        key: AssetKey,
        budget: Duration,
        finish: impl FnOnce(&ViewerLifecycle, u64, Result<LoadResult, Elapsed>) -> Result<(), ViewerError>
            + Send
            + 'static,
    ) -> Attempt {
        st.epoch += 1;
        let epoch = st.epoch;
        let load = self.inner.services.cache.acquire(&key);
        st.pending_key = Some(key);
        st.load_started = Some(Instant::now());

        let weak = Arc::downgrade(&self.inner);
        let attempt = tokio::spawn(async move {
            let outcome = time::timeout(budget, load).await;
            match weak.upgrade() {
                Some(inner) => finish(&ViewerLifecycle { inner }, epoch, outcome),
                None => Err(ViewerError::Superseded),
            }
        });
        st.attempt = Some(attempt.abort_handle());
        attempt
    }

    fn begin_initial(&self, st: &mut InstanceState) -> Result<Attempt, ViewerError> {
        let services = &self.inner.services;
        let key = AssetKey::new(self.inner.product.clone(), st.variant.clone());

        self.transition(st, ViewerState::Loading);
        st.load_kind = LoadKind::Initial;
        st.notice = None;
        st.presentation = Presentation::Loading {
            poster_url: services.cache.resolver().poster_url(&key),
        };
        services.metrics.record_load_started(&self.inner.id, LoadKind::Initial);
        st.logger
            .info_builder("loading model")
            .field("url", services.cache.resolver().model_url(&key))
            .emit();

        if st.context.is_none() {
            match services.backend.create_context(&self.inner.id, st.size) {
                Ok(ctx) => st.context = Some(ctx),
                Err(e) => return Err(self.fail_initial(st, &key, e)),
            }
        }

        let budget = services.config.timeouts.initial_load();
        Ok(self.spawn_attempt(st, key, budget, move |this, epoch, outcome| {
            this.finish_initial(epoch, budget, outcome)
        }))
    }

    fn finish_initial(
        &self,
        epoch: u64,
        budget: Duration,
        outcome: Result<LoadResult, Elapsed>,
    ) -> Result<(), ViewerError> {
        self.with_state(|st| {
            if st.epoch != epoch || st.state != ViewerState::Loading {
                return Err(self.stale(st));
            }
            st.attempt = None;
            let Some(key) = st.pending_key.take() else {
                return Err(ViewerError::Superseded);
            };

            let presented = match outcome {
                Ok(Ok(asset)) => match st.context {
                    Some(ctx) => self.switcher().present(ctx, &asset),
                    None => Err(ViewerError::Render("render context missing".into())),
                },
                Ok(Err(e)) => Err(e.into()),
                Err(_) => Err(ViewerError::Timeout(budget)),
            };

            let out = match presented {
                Ok(out) => out,
                Err(e) => {
                    self.inner.services.cache.release(&key);
                    return Err(self.fail_initial(st, &key, e));
                }
            };

            st.root = Some(out.root);
            st.camera = out.camera;
            st.active_key = Some(key);
            let elapsed = st.load_started.map(|t| t.elapsed()).unwrap_or_default();

            self.transition(st, ViewerState::Ready);
            st.presentation = Presentation::Canvas;
            self.sync_render_loop(st);

            self.inner
                .services
                .metrics
                .record_ready(&self.inner.id, LoadKind::Initial, elapsed);
            st.logger
                .info_builder("viewer ready")
                .duration_ms("time_to_ready_ms", elapsed)
                .emit();
            Ok(())
        })
    }

    /// Release GPU resources for the failed attempt and show the fallback.
    fn fail_initial(&self, st: &mut InstanceState, key: &AssetKey, error: ViewerError) -> ViewerError {
        self.release_gpu(st);
        self.transition(st, ViewerState::Error);
        st.presentation = Presentation::Fallback {
            image_url: self.inner.services.cache.resolver().fallback_image_url(key),
            can_retry: error.is_retryable(),
        };

        self.inner
            .services
            .metrics
            .record_failure(&self.inner.id, LoadKind::Initial, error.kind());
        st.logger
            .warn_builder("load failed")
            .field("kind", error.kind())
            .field("error", error.to_string())
            .emit();
        error
    }

    fn begin_switch(&self, st: &mut InstanceState, variant: VariantId) -> Result<Option<Attempt>, ViewerError> {
        let services = &self.inner.services;
        let product = &self.inner.product;

        if st.state == ViewerState::Disposed {
            return Err(ViewerError::Disposed(self.inner.id.clone()));
        }
        if !services.catalog.contains_product(product) {
            return Err(ViewerError::UnknownProduct(product.clone()));
        }
        if services.catalog.variant(product, &variant).is_none() {
            return Err(ViewerError::UnknownVariant {
                product: product.clone(),
                variant,
            });
        }

        let superseding = st.state == ViewerState::Loading && st.load_kind == LoadKind::VariantSwitch;
        if st.state != ViewerState::Ready && !superseding {
            return Err(self.not_ready(st.state, ViewerState::Ready));
        }
        if superseding {
            st.logger.debug("superseding in-flight variant switch");
            self.cancel_attempt(st);
        }

        if variant == st.variant {
            if superseding {
                self.transition(st, ViewerState::Ready);
            }
            return Ok(None);
        }

        let Some(ctx) = st.context else {
            return Err(ViewerError::Render("render context missing".into()));
        };
        let snapshot = self.switcher().snapshot(ctx, st.camera);

        if !superseding {
            self.transition(st, ViewerState::Loading);
        }
        st.load_kind = LoadKind::VariantSwitch;
        st.notice = None;
        services
            .metrics
            .record_load_started(&self.inner.id, LoadKind::VariantSwitch);
        st.logger
            .info_builder("switching variant")
            .field("to", variant.as_str())
            .emit();

        let key = AssetKey::new(product.clone(), variant.clone());
        let budget = services.config.timeouts.variant_switch();
        Ok(Some(self.spawn_attempt(st, key, budget, move |this, epoch, outcome| {
            this.finish_switch(epoch, budget, variant, snapshot, outcome)
        })))
    }

    fn finish_switch(
        &self,
        epoch: u64,
        budget: Duration,
        variant: VariantId,
        snapshot: CameraState,
        outcome: Result<LoadResult, Elapsed>,
    ) -> Result<(), ViewerError> {
        self.with_state(|st| {
            if st.epoch != epoch || st.state != ViewerState::Loading {
                return Err(self.stale(st));
            }
            st.attempt = None;
            let Some(key) = st.pending_key.take() else {
                return Err(ViewerError::Superseded);
            };

            let swapped = match outcome {
                Ok(Ok(asset)) => match st.context {
                    Some(ctx) => self.switcher().swap(ctx, st.root, &asset, snapshot),
                    None => Err(ViewerError::Render("render context missing".into())),
                },
                Ok(Err(e)) => Err(e.into()),
                Err(_) => Err(ViewerError::Timeout(budget)),
            };
            let elapsed = st.load_started.map(|t| t.elapsed()).unwrap_or_default();
            let services = &self.inner.services;

            match swapped {
                Ok(out) => {
                    st.root = Some(out.root);
                    st.camera = out.camera;
                    if let Some(previous) = st.active_key.replace(key) {
                        services.cache.release(&previous);
                    }
                    st.variant = variant.clone();
                    st.logger.set_variant(variant);

                    self.transition(st, ViewerState::Ready);
                    self.sync_render_loop(st);
                    services
                        .metrics
                        .record_ready(&self.inner.id, LoadKind::VariantSwitch, elapsed);
                    st.logger
                        .info_builder("variant switched")
                        .duration_ms("elapsed_ms", elapsed)
                        .emit();
                    Ok(())
                }
                Err(e) => {
                    services.cache.release(&key);
                    let message = format!("Couldn't show {}: {}", variant, e);
                    st.notice = Some(message.clone());
                    st.events.push(Event::Notice(message));

                    self.transition(st, ViewerState::Ready);
                    services
                        .metrics
                        .record_failure(&self.inner.id, LoadKind::VariantSwitch, e.kind());
                    st.logger
                        .warn_builder("variant switch failed")
                        .field("to", variant.as_str())
                        .field("kind", e.kind())
                        .emit();
                    Err(e)
                }
            }
        })
    }
}

impl fmt::Debug for ViewerLifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let st = self.lock();
        f.debug_struct("ViewerLifecycle")
            .field("id", &self.inner.id)
            .field("state", &st.state)
            .field("variant", &st.variant)
            .field("rendering", &st.rendering)
            .finish()
    }
}
