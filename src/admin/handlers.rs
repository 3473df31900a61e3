use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::http::server::AppState;
use crate::security::{BlockedSource, SecurityEvent, SecurityStats, ShieldError};

/// Default number of events returned by `/admin/events`.
pub const DEFAULT_EVENT_LIMIT: usize = 50;

/// Store failures surface as 500 with a JSON body.
pub struct AdminError(ShieldError);

impl From<ShieldError> for AdminError {
    fn from(e: ShieldError) -> Self {
        Self(e)
    }
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self.0, "Admin request failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": "Internal Server Error", "reason": self.0.to_string() })),
        )
            .into_response()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub blocked_sources: usize,
    pub tracked_sources: usize,
    pub event_log_size: usize,
}

#[derive(Debug, Default, Deserialize)]
pub struct StatsQuery {
    pub window_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct EventsQuery {
    pub limit: Option<usize>,
}

#[derive(Serialize)]
pub struct ClearResult {
    pub success: bool,
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    let shield = &state.shield;
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        blocked_sources: shield.block_registry().active_count(shield.now_ms()),
        tracked_sources: shield.rate_limiter().tracked_sources(),
        event_log_size: shield.event_log().len(),
    })
}

pub async fn get_stats(
    State(state): State<AppState>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<SecurityStats>, AdminError> {
    Ok(Json(state.shield.stats(query.window_ms)?))
}

pub async fn get_events(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> Result<Json<Vec<SecurityEvent>>, AdminError> {
    let limit = query.limit.unwrap_or(DEFAULT_EVENT_LIMIT);
    Ok(Json(state.shield.recent_events(limit)?))
}

pub async fn get_blocked(State(state): State<AppState>) -> Json<Vec<BlockedSource>> {
    Json(state.shield.blocked_sources())
}

pub async fn clear_state(State(state): State<AppState>) -> Result<Json<ClearResult>, AdminError> {
    state.shield.clear()?;
    Ok(Json(ClearResult { success: true }))
}
