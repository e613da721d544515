//! HTTP handlers over the explorer session.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{delete, get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tracing::error;

use skytrade_explorer::fetch::HttpPointSource;
use skytrade_explorer::models::PointFeatureCollection;
use skytrade_explorer::perf::PerformanceSnapshot;
use skytrade_explorer::viewport::{
    CycleReport, CycleTrigger, HexGridResponse, HexSelection, SessionStatus, SkipReason,
    NOT_CONFIGURED_MESSAGE,
};
use skytrade_explorer::{DataType, ExplorerError, ExplorerSession, GeoBounds, TabType};

/// Application state shared across handlers
pub struct AppState {
    pub session: ExplorerSession<HttpPointSource>,
}

type SharedState = Arc<AppState>;

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/v1/viewport/move-start", post(move_start_handler))
        .route("/v1/viewport/move-end", post(move_end_handler))
        .route("/v1/viewport/zoom", post(zoom_handler))
        .route("/v1/frames", post(frames_handler))
        .route("/v1/hexgrid", get(hexgrid_handler))
        .route("/v1/hex/{cell_id}", get(hex_handler))
        .route("/v1/sidebar/close", post(close_sidebar_handler))
        .route("/v1/points/refresh", post(refresh_points_handler))
        .route("/v1/points", get(points_handler))
        .route("/v1/retry", post(retry_handler))
        .route("/v1/status", get(status_handler))
        .route("/v1/cache", delete(clear_cache_handler))
        .with_state(state)
}

fn error_response(e: ExplorerError) -> (StatusCode, String) {
    let status = match &e {
        ExplorerError::Geometry(_) => StatusCode::BAD_REQUEST,
        ExplorerError::Configuration(_) => StatusCode::SERVICE_UNAVAILABLE,
        ExplorerError::Fetch(_) => StatusCode::BAD_GATEWAY,
    };
    error!("Request failed: {}", e);
    (status, e.to_string())
}

fn validate_bounds(bounds: &GeoBounds) -> Result<(), (StatusCode, String)> {
    let finite = [bounds.north, bounds.south, bounds.east, bounds.west]
        .iter()
        .all(|v| v.is_finite());
    if !finite || bounds.north < bounds.south {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("invalid bounds {:?}", bounds),
        ));
    }
    Ok(())
}

fn validate_zoom(zoom: f64) -> Result<(), (StatusCode, String)> {
    if !zoom.is_finite() || zoom < 0.0 {
        return Err((StatusCode::BAD_REQUEST, format!("invalid zoom {}", zoom)));
    }
    Ok(())
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    api_configured: bool,
}

/// Health check endpoint
async fn health_handler(State(state): State<SharedState>) -> Json<HealthResponse> {
    let configured = state.session.source().base_url().is_some();
    Json(HealthResponse {
        status: if configured { "ok" } else { "degraded" },
        api_configured: configured,
    })
}

async fn move_start_handler(State(state): State<SharedState>) -> StatusCode {
    state.session.move_start();
    StatusCode::NO_CONTENT
}

#[derive(Deserialize)]
struct MoveEndBody {
    bounds: GeoBounds,
    zoom: f64,
    /// Switches the tab the next cycles plan for
    tab: Option<TabType>,
}

/// Commit the settled viewport; the fetch cycle follows after the debounce
async fn move_end_handler(
    State(state): State<SharedState>,
    Json(body): Json<MoveEndBody>,
) -> Result<StatusCode, (StatusCode, String)> {
    validate_bounds(&body.bounds)?;
    validate_zoom(body.zoom)?;

    if let Some(tab) = body.tab {
        state.session.set_tab(tab);
    }
    // Detached; superseded cycles finish on their own
    drop(state.session.move_end(body.bounds, body.zoom));

    Ok(StatusCode::ACCEPTED)
}

#[derive(Deserialize)]
struct ZoomBody {
    zoom: f64,
}

async fn zoom_handler(
    State(state): State<SharedState>,
    Json(body): Json<ZoomBody>,
) -> Result<StatusCode, (StatusCode, String)> {
    validate_zoom(body.zoom)?;
    state.session.set_zoom(body.zoom);
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
struct FramesBody {
    frames: u64,
}

/// Frames rendered since the previous report
async fn frames_handler(
    State(state): State<SharedState>,
    Json(body): Json<FramesBody>,
) -> Json<PerformanceSnapshot> {
    state.session.record_frames(body.frames);
    Json(state.session.monitor().snapshot())
}

#[derive(Deserialize)]
struct TabQuery {
    tab: Option<TabType>,
}

async fn hexgrid_handler(
    State(state): State<SharedState>,
    Query(params): Query<TabQuery>,
) -> Json<HexGridResponse> {
    Json(state.session.hex_grid(params.tab.unwrap_or_default()))
}

#[derive(Deserialize)]
struct HexQuery {
    #[serde(rename = "type")]
    data_type: DataType,
    /// Point count of the clicked feature
    #[serde(default)]
    count: usize,
}

/// Cell click
async fn hex_handler(
    State(state): State<SharedState>,
    Path(cell_id): Path<String>,
    Query(params): Query<HexQuery>,
) -> Result<Json<HexSelection>, (StatusCode, String)> {
    state
        .session
        .select_hex(&cell_id, params.data_type, params.count)
        .await
        .map(Json)
        .map_err(error_response)
}

async fn close_sidebar_handler(State(state): State<SharedState>) -> StatusCode {
    if state.session.close_sidebar() {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

#[derive(Deserialize)]
struct RefreshBody {
    #[serde(default)]
    tab: TabType,
    bounds: GeoBounds,
}

/// Point view refresh for a settled viewport
async fn refresh_points_handler(
    State(state): State<SharedState>,
    Json(body): Json<RefreshBody>,
) -> Result<Json<PointFeatureCollection>, (StatusCode, String)> {
    validate_bounds(&body.bounds)?;
    state
        .session
        .refresh_points(body.tab, body.bounds)
        .await
        .map(Json)
        .map_err(error_response)
}

async fn points_handler(
    State(state): State<SharedState>,
    Query(params): Query<TabQuery>,
) -> Json<PointFeatureCollection> {
    Json(state.session.points(params.tab.unwrap_or_default()))
}

/// Refetch the bounds of the last failed cycle
async fn retry_handler(
    State(state): State<SharedState>,
) -> Result<Json<CycleReport>, (StatusCode, String)> {
    let report = state.session.run_cycle(CycleTrigger::Retry).await;
    if report.skipped == Some(SkipReason::NotConfigured) {
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            NOT_CONFIGURED_MESSAGE.to_string(),
        ));
    }
    if report.failed > 0 {
        error!("Retry failed for {} of {} areas", report.failed, report.requested);
        return Err((
            StatusCode::BAD_GATEWAY,
            format!("{} of {} fetch areas failed", report.failed, report.requested),
        ));
    }
    Ok(Json(report))
}

async fn status_handler(State(state): State<SharedState>) -> Json<SessionStatus> {
    Json(state.session.status())
}

async fn clear_cache_handler(State(state): State<SharedState>) -> StatusCode {
    state.session.clear_cache();
    StatusCode::NO_CONTENT
}
