//! Viewport state machine and fetch-cycle planning.
//!
//! The controller owns no I/O. It commits viewport changes, decides what a
//! planning cycle should fetch and records how the cycle ended; the
//! session drives the requests in between.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::fetch::{plan_fetch, FetchArea, ViewportOverlapPolicy};
use crate::models::{CachedArea, GeoBounds, TabType};
use crate::store::PointStore;

pub const FETCH_FAILED_MESSAGE: &str = "Failed to load map data. Please try again.";
pub const NOT_CONFIGURED_MESSAGE: &str = "API URL not configured";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewportPhase {
    Idle,
    Moving,
}

/// What started a planning cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CycleTrigger {
    /// Session start, over the initial bounds
    Initial,
    /// Debounced move-end
    Viewport,
    /// Manual retry over the bounds of the last failure
    Retry,
}

/// Why a cycle issued no requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The map moved again before the cycle ran
    Moving,
    /// The viewport is mostly covered by a recent fetch
    Overlap,
    /// Every data type reuses cached points
    NothingToFetch,
    /// Retry requested without a failed cycle to repeat
    NothingToRetry,
    NotConfigured,
}

/// User-visible error, with the bounds a retry would refetch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchBanner {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounds: Option<GeoBounds>,
}

/// Requests one cycle should issue
#[derive(Debug, Clone, PartialEq)]
pub struct CyclePlan {
    pub trigger: CycleTrigger,
    pub bounds: GeoBounds,
    pub zoom: f64,
    pub areas: Vec<FetchArea>,
}

#[derive(Debug)]
pub struct ViewportController {
    phase: ViewportPhase,
    bounds: GeoBounds,
    zoom: f64,
    prev_zoom: f64,
    initial_bounds: GeoBounds,
    tab: TabType,
    overlap: ViewportOverlapPolicy,
    loading: bool,
    banner: Option<FetchBanner>,
}

impl ViewportController {
    pub fn new(initial_bounds: GeoBounds, initial_zoom: f64, tab: TabType) -> Self {
        Self {
            phase: ViewportPhase::Idle,
            bounds: initial_bounds,
            zoom: initial_zoom,
            prev_zoom: initial_zoom,
            initial_bounds,
            tab,
            overlap: ViewportOverlapPolicy::default(),
            loading: false,
            banner: None,
        }
    }

    pub fn move_start(&mut self) {
        self.phase = ViewportPhase::Moving;
    }

    /// Commit the settled viewport and return to idle
    pub fn move_end(&mut self, bounds: GeoBounds, zoom: f64) {
        self.bounds = bounds;
        self.zoom = zoom;
        self.phase = ViewportPhase::Idle;
    }

    /// Zoom changes are tracked continuously, not only at move-end
    pub fn set_zoom(&mut self, zoom: f64) {
        self.zoom = zoom;
    }

    pub fn set_tab(&mut self, tab: TabType) {
        self.tab = tab;
    }

    pub fn phase(&self) -> ViewportPhase {
        self.phase
    }

    pub fn bounds(&self) -> GeoBounds {
        self.bounds
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn prev_zoom(&self) -> f64 {
        self.prev_zoom
    }

    pub fn tab(&self) -> TabType {
        self.tab
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn banner(&self) -> Option<&FetchBanner> {
        self.banner.as_ref()
    }

    /// Plan a cycle against the store.
    ///
    /// Viewport cycles are first checked against the recent fetch log and,
    /// when not suppressed, logged there. Every data type of the active
    /// tab is then planned; the previous zoom advances afterwards. A
    /// non-empty plan marks the controller loading and clears the banner.
    pub fn plan_cycle(
        &mut self,
        store: &mut PointStore,
        trigger: CycleTrigger,
    ) -> Result<CyclePlan, SkipReason> {
        if self.phase == ViewportPhase::Moving {
            debug!("Skipping {:?} cycle while the map is moving", trigger);
            return Err(SkipReason::Moving);
        }

        let bounds = match trigger {
            CycleTrigger::Initial => self.initial_bounds,
            CycleTrigger::Viewport => self.bounds,
            CycleTrigger::Retry => match self.banner.as_ref().and_then(|b| b.bounds) {
                Some(bounds) => bounds,
                None => return Err(SkipReason::NothingToRetry),
            },
        };

        if trigger == CycleTrigger::Viewport {
            let recent = store
                .recent_areas(self.overlap.history)
                .map(|area| &area.bounds);
            if !self.overlap.should_fetch(&bounds, recent) {
                debug!("Viewport {:?} already loaded, skipping fetch", bounds);
                return Err(SkipReason::Overlap);
            }
            store.record_fetched_area(CachedArea::new(bounds, self.zoom));
        }

        let areas: Vec<FetchArea> = self
            .tab
            .data_types()
            .flat_map(|data_type| {
                plan_fetch(&bounds, self.zoom, data_type, self.prev_zoom, store.len(data_type))
            })
            .collect();
        self.prev_zoom = self.zoom;

        if areas.is_empty() {
            debug!("Nothing to fetch for {:?} cycle", trigger);
            return Err(SkipReason::NothingToFetch);
        }

        info!(
            "Planned {} fetch areas for {:?} cycle at zoom {:.2}",
            areas.len(),
            trigger,
            self.zoom
        );
        self.loading = true;
        self.banner = None;

        Ok(CyclePlan {
            trigger,
            bounds,
            zoom: self.zoom,
            areas,
        })
    }

    /// Record the end of a cycle. Any failed sub-area raises the retry banner.
    pub fn finish_cycle(&mut self, plan: &CyclePlan, failed: usize) {
        self.loading = false;
        if failed > 0 {
            warn!(
                "{} of {} fetch areas failed for {:?} cycle",
                failed,
                plan.areas.len(),
                plan.trigger
            );
            self.banner = Some(FetchBanner {
                message: FETCH_FAILED_MESSAGE.to_string(),
                bounds: Some(plan.bounds),
            });
        }
    }

    /// Raise an error banner outside a planned cycle
    pub fn fail(&mut self, message: &str, bounds: Option<GeoBounds>) {
        self.loading = false;
        self.banner = Some(FetchBanner {
            message: message.to_string(),
            bounds,
        });
    }
}
