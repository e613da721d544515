//! One explorer session: the injected state container plus the async
//! plumbing around it (debounced planning, concurrent fetches, the frame
//! sampler).
//!
//! All state lives behind one lock that is never held across an await.
//! Fetches run outside the lock and their results are committed when every
//! sub-area has settled. Responses of superseded cycles still commit.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures::future::join_all;
use hashbrown::HashMap;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::cluster::ClusterView;
use super::controller::{
    CycleTrigger, FetchBanner, SkipReason, ViewportController, ViewportPhase,
    FETCH_FAILED_MESSAGE, NOT_CONFIGURED_MESSAGE,
};
use super::selection::{
    find_points_in_hex, fly_to_target, load_hex_data, should_load_details, EmptyCells,
    HexSelection, SidebarPayload,
};
use super::visible::visible_points;
use crate::config::Config;
use crate::error::ExplorerError;
use crate::fetch::{FetchRequest, PointSource};
use crate::hex::{indexer, HexAggregator, HexGridOutput};
use crate::models::{DataType, FeatureCollection, GeoBounds, Point, PointFeatureCollection, TabType};
use crate::perf::{FrameSampler, PerformanceMonitor, PerformanceSnapshot};
use crate::store::PointStore;

/// Everything a session mutates
#[derive(Debug)]
pub struct ExplorerState {
    pub controller: ViewportController,
    pub store: PointStore,
    pub aggregator: HexAggregator,
    pub empty_cells: EmptyCells,
    pub clusters: HashMap<DataType, ClusterView>,
    pub sidebar: Option<SidebarPayload>,
}

/// Outcome of one planning cycle
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleReport {
    pub trigger: CycleTrigger,
    pub requested: usize,
    pub failed: usize,
    /// Previously unseen point ids committed
    pub added: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<SkipReason>,
}

impl CycleReport {
    fn skipped(trigger: CycleTrigger, reason: SkipReason) -> Self {
        Self {
            trigger,
            requested: 0,
            failed: 0,
            added: 0,
            skipped: Some(reason),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HexLayer {
    pub tag: DataType,
    pub visible_points: usize,
    #[serde(flatten)]
    pub output: HexGridOutput,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HexGridResponse {
    pub zoom: f64,
    pub performance: PerformanceSnapshot,
    pub layers: Vec<HexLayer>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeCounts {
    pub data_type: DataType,
    pub visible: usize,
    pub total: usize,
}

/// Stats overlay
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub phase: ViewportPhase,
    /// One decimal
    pub zoom: f64,
    pub bounds: GeoBounds,
    pub tab: TabType,
    pub loading: bool,
    pub error: Option<FetchBanner>,
    pub counts: Vec<TypeCounts>,
    pub performance: PerformanceSnapshot,
    pub cached_grids: usize,
    pub fetched_areas: usize,
    pub sidebar_open: bool,
}

struct Inner<S> {
    source: S,
    state: Mutex<ExplorerState>,
    monitor: Arc<PerformanceMonitor>,
    debounce: Duration,
    sample_interval: Duration,
    max_points_per_request: u32,
    /// Bumped by every viewport event; a debounced cycle runs only if it
    /// still holds the latest value when its delay ends
    generation: AtomicU64,
    shutdown: CancellationToken,
    sampler: Mutex<Option<FrameSampler>>,
}

/// Cheap to clone; clones share one session
pub struct ExplorerSession<S> {
    inner: Arc<Inner<S>>,
}

impl<S> Clone for ExplorerSession<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: PointSource> ExplorerSession<S> {
    pub fn new(source: S, config: &Config) -> Self {
        let state = ExplorerState {
            controller: ViewportController::new(
                config.viewport.initial_bounds,
                config.viewport.initial_zoom,
                config.viewport.tab,
            ),
            store: PointStore::new(),
            aggregator: HexAggregator::new(
                config.hexgrid.max_features,
                config.hexgrid.sampling_threshold,
                config.hexgrid.cache_capacity,
            ),
            empty_cells: EmptyCells::default(),
            clusters: HashMap::new(),
            sidebar: None,
        };

        Self {
            inner: Arc::new(Inner {
                source,
                state: Mutex::new(state),
                monitor: Arc::new(PerformanceMonitor::new()),
                debounce: config.debounce(),
                sample_interval: config.sample_interval(),
                max_points_per_request: config.api.max_points_per_request,
                generation: AtomicU64::new(0),
                shutdown: CancellationToken::new(),
                sampler: Mutex::new(None),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, ExplorerState> {
        self.inner.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn source(&self) -> &S {
        &self.inner.source
    }

    pub fn monitor(&self) -> &Arc<PerformanceMonitor> {
        &self.inner.monitor
    }

    /// Start the frame sampler. Calling it again is a no-op.
    pub fn start(&self) {
        let mut sampler = self.inner.sampler.lock().unwrap_or_else(|e| e.into_inner());
        if sampler.is_none() {
            *sampler = Some(FrameSampler::spawn(
                Arc::clone(&self.inner.monitor),
                self.inner.sample_interval,
                self.inner.shutdown.child_token(),
            ));
        }
    }

    /// Stop the sampler and drop pending debounced cycles
    pub async fn shutdown(&self) {
        self.inner.shutdown.cancel();
        let sampler = self
            .inner
            .sampler
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(sampler) = sampler {
            sampler.stop().await;
        }
        info!("Explorer session stopped");
    }

    pub fn is_running(&self) -> bool {
        self.inner
            .sampler
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .is_some_and(|s| !s.is_finished())
    }

    pub fn move_start(&self) {
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        self.state().controller.move_start();
    }

    /// Commit the settled viewport and schedule a debounced cycle.
    ///
    /// The returned task yields `None` when a later viewport event (or
    /// shutdown) superseded it before the delay ended.
    pub fn move_end(&self, bounds: GeoBounds, zoom: f64) -> JoinHandle<Option<CycleReport>> {
        self.state().controller.move_end(bounds, zoom);
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let session = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = session.inner.shutdown.cancelled() => return None,
                _ = tokio::time::sleep(session.inner.debounce) => {}
            }

            if session.inner.generation.load(Ordering::SeqCst) != generation {
                debug!("Viewport change superseded, dropping cycle {}", generation);
                return None;
            }
            Some(session.run_cycle(CycleTrigger::Viewport).await)
        })
    }

    pub fn set_zoom(&self, zoom: f64) {
        self.state().controller.set_zoom(zoom);
    }

    pub fn set_tab(&self, tab: TabType) {
        self.state().controller.set_tab(tab);
    }

    pub fn record_frames(&self, frames: u64) {
        self.inner.monitor.record_frames(frames);
    }

    /// Plan, fetch and commit one cycle.
    ///
    /// Sub-area requests run concurrently; successes are committed even
    /// when others fail, and any failure raises the retry banner.
    pub async fn run_cycle(&self, trigger: CycleTrigger) -> CycleReport {
        if let Err(e) = self.inner.source.ensure_ready() {
            error!("Cannot run {:?} cycle: {}", trigger, e);
            let mut state = self.state();
            let bounds = state.controller.bounds();
            state.controller.fail(NOT_CONFIGURED_MESSAGE, Some(bounds));
            return CycleReport::skipped(trigger, SkipReason::NotConfigured);
        }

        let plan = {
            let mut guard = self.state();
            let state = &mut *guard;
            match state.controller.plan_cycle(&mut state.store, trigger) {
                Ok(plan) => plan,
                Err(reason) => return CycleReport::skipped(trigger, reason),
            }
        };

        let limit = self.inner.max_points_per_request;
        let source = &self.inner.source;
        let results = join_all(plan.areas.iter().map(|area| {
            let request = FetchRequest::from(area).with_limit(limit);
            async move { source.fetch(&request).await }
        }))
        .await;

        let mut report = CycleReport {
            trigger,
            requested: plan.areas.len(),
            failed: 0,
            added: 0,
            skipped: None,
        };

        let mut guard = self.state();
        let state = &mut *guard;
        for (area, result) in plan.areas.iter().zip(results) {
            match result {
                Ok(points) => {
                    report.added += state.store.add_points(area.data_type, points);
                }
                Err(e) => {
                    warn!(
                        "Error fetching {} data for {:?}: {}",
                        area.data_type, area.bounds, e
                    );
                    report.failed += 1;
                }
            }
        }
        state.controller.finish_cycle(&plan, report.failed);

        info!(
            "{:?} cycle done: {} requests, {} failed, {} new points",
            trigger, report.requested, report.failed, report.added
        );
        report
    }

    /// Hex layers of the current viewport for each data type of `tab`
    pub fn hex_grid(&self, tab: TabType) -> HexGridResponse {
        let performance = self.inner.monitor.snapshot();
        let mut guard = self.state();
        let state = &mut *guard;
        let bounds = state.controller.bounds();
        let zoom = state.controller.zoom();

        let mut layers = Vec::new();
        for data_type in tab.data_types() {
            let visible = visible_points(state.store.all_points(data_type), &bounds, zoom);
            let output = state
                .aggregator
                .grid_for(&visible, zoom, data_type, &performance);
            layers.push(HexLayer {
                tag: data_type,
                visible_points: visible.len(),
                output,
            });
        }

        HexGridResponse {
            zoom,
            performance,
            layers,
        }
    }

    /// Handle a click on a rendered cell carrying `count` points
    pub async fn select_hex(
        &self,
        cell_id: &str,
        data_type: DataType,
        count: usize,
    ) -> Result<HexSelection, ExplorerError> {
        let cell = indexer::parse_cell(cell_id)?;
        let resolution = indexer::resolution_of(cell);

        let (initial, zoom, known_empty) = {
            let state = self.state();
            let bounds = state.controller.bounds();
            let zoom = state.controller.zoom();
            let visible = visible_points(state.store.all_points(data_type), &bounds, zoom);
            let initial: Vec<Point> = find_points_in_hex(cell, visible)
                .into_iter()
                .cloned()
                .collect();
            (initial, zoom, state.empty_cells.contains(cell, data_type))
        };

        let details_loaded = should_load_details(count, initial.len(), resolution);
        let points = if !details_loaded {
            initial
        } else if known_empty {
            debug!("Cell {} known empty for {}", cell, data_type);
            Vec::new()
        } else {
            match load_hex_data(&self.inner.source, cell, data_type, initial.clone()).await {
                Ok(detail) => {
                    if detail.cell_empty {
                        self.state().empty_cells.mark(cell, data_type);
                    }
                    detail.points
                }
                Err(e) => {
                    error!("Cannot load cell {}: {}", cell, e);
                    self.state().controller.fail(NOT_CONFIGURED_MESSAGE, None);
                    Vec::new()
                }
            }
        };

        let sidebar = SidebarPayload::new(cell, data_type, points);
        self.state().sidebar = Some(sidebar.clone());

        Ok(HexSelection {
            sidebar,
            details_loaded,
            fly_to: fly_to_target(cell, count, zoom),
        })
    }

    /// Hide the sidebar, returning whether it was open
    pub fn close_sidebar(&self) -> bool {
        self.state().sidebar.take().is_some()
    }

    /// Point view refresh for a settled viewport.
    ///
    /// Each data type of `tab` fetches only when its view accepts the move;
    /// a failed fetch keeps the previous features and raises the banner.
    /// When every accepted fetch fails the last error is returned.
    pub async fn refresh_points(
        &self,
        tab: TabType,
        bounds: GeoBounds,
    ) -> Result<PointFeatureCollection, ExplorerError> {
        if let Err(e) = self.inner.source.ensure_ready() {
            self.state().controller.fail(NOT_CONFIGURED_MESSAGE, Some(bounds));
            return Err(e.into());
        }

        let mut attempted = 0;
        let mut failed = 0;
        let mut last_error = None;
        for data_type in tab.data_types() {
            let accepted = self
                .state()
                .clusters
                .entry(data_type)
                .or_default()
                .should_refresh(&bounds);
            if !accepted {
                continue;
            }
            attempted += 1;

            match self.inner.source.fetch(&FetchRequest::new(data_type, bounds)).await {
                Ok(points) => {
                    info!("Point view for {} replaced with {} points", data_type, points.len());
                    self.state()
                        .clusters
                        .entry(data_type)
                        .or_default()
                        .replace(bounds, &points);
                }
                Err(e) => {
                    warn!("Error fetching {} points: {}", data_type, e);
                    self.state().controller.fail(FETCH_FAILED_MESSAGE, Some(bounds));
                    failed += 1;
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if failed == attempted => Err(e),
            _ => Ok(self.points(tab)),
        }
    }

    /// Current point features for `tab`
    pub fn points(&self, tab: TabType) -> PointFeatureCollection {
        let state = self.state();
        let features = tab
            .data_types()
            .filter_map(|data_type| state.clusters.get(&data_type))
            .flat_map(|view| view.features().features.iter().cloned())
            .collect();
        FeatureCollection::new(features)
    }

    pub fn status(&self) -> SessionStatus {
        let performance = self.inner.monitor.snapshot();
        let state = self.state();
        let controller = &state.controller;
        let bounds = controller.bounds();

        let counts = DataType::all()
            .iter()
            .map(|&data_type| {
                let all = state.store.all_points(data_type);
                TypeCounts {
                    data_type,
                    visible: visible_points(all, &bounds, controller.zoom()).len(),
                    total: all.len(),
                }
            })
            .collect();

        SessionStatus {
            phase: controller.phase(),
            zoom: (controller.zoom() * 10.0).round() / 10.0,
            bounds,
            tab: controller.tab(),
            loading: controller.is_loading(),
            error: controller.banner().cloned(),
            counts,
            performance,
            cached_grids: state.aggregator.cached_grids(),
            fetched_areas: state.store.fetched_areas().count(),
            sidebar_open: state.sidebar.is_some(),
        }
    }

    /// Drop every cached point, grid and memo
    pub fn clear_cache(&self) {
        let mut state = self.state();
        state.store.clear();
        state.aggregator.clear();
        state.empty_cells.clear();
        state.clusters.clear();
        info!("Explorer caches cleared");
    }
}
