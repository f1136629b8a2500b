use crate::error::AppError;
use crate::models::*;
use crate::visitor::{self, VisitorIdentity};
use crate::AppState;
use axum::{
    extract::{ConnectInfo, Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::NaiveDate;
use serde_json::json;
use std::net::SocketAddr;
use tracing::{debug, info};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        record_view,
        get_overview,
        list_daily_stats,
        get_daily_stat,
        run_archival_job,
        run_trim_job
    ),
    components(schemas(
        RecordViewRequest,
        OverviewSnapshot,
        LeaderboardEntry,
        DailyStat,
        ArchiveResponse,
        ArchiveJobResponse,
        TrimJobResponse
    )),
    tags(
        (name = "Views", description = "View event ingestion"),
        (name = "Analytics", description = "Dashboard overview and daily archive"),
        (name = "Jobs", description = "Manual triggers for the rollup jobs")
    )
)]
pub struct ApiDoc;

/// Record one content view
///
/// **Purpose:** Called by the content service every time a published item is
/// rendered. Recording happens on a background task; the response never
/// waits on the counter store.
///
/// **Visitor identity:** `user_id` when the reader is signed in, otherwise
/// `client_ip`, otherwise the first address in `X-Forwarded-For`,
/// `X-Real-IP` or `CF-Connecting-IP`, otherwise the peer address.
#[utoipa::path(
    post,
    path = "/views",
    tag = "Views",
    request_body = RecordViewRequest,
    responses(
        (status = 202, description = "View accepted; `accepted` is false when no content id was given")
    )
)]
pub async fn record_view(
    State(state): State<AppState>,
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    Json(req): Json<RecordViewRequest>,
) -> (StatusCode, Json<serde_json::Value>) {
    let client_ip = req
        .client_ip
        .as_deref()
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| visitor::client_ip(&headers, peer.map(|ConnectInfo(addr)| addr)));
    let visitor = VisitorIdentity::resolve(req.user_id, &client_ip);

    debug!("View event: content={:?} visitor={}", req.content_id, visitor);

    let today = state.recorder.today();
    state
        .recorder
        .record_view_detached(req.content_id, visitor, today);

    (
        StatusCode::ACCEPTED,
        Json(json!({ "accepted": req.content_id.is_some() })),
    )
}

/// Dashboard overview
///
/// Today's page views and approximate unique visitors, the content service's
/// published and pending-moderation counts, and the top of the leaderboard.
#[utoipa::path(
    get,
    path = "/admin/analytics/overview",
    tag = "Analytics",
    responses(
        (status = 200, description = "Current overview", body = OverviewSnapshot),
        (status = 500, description = "Content store error")
    )
)]
pub async fn get_overview(
    State(state): State<AppState>,
) -> Result<Json<OverviewSnapshot>, AppError> {
    let overview = state.overview.get_overview().await?;
    Ok(Json(overview))
}

/// Archived daily statistics
#[utoipa::path(
    get,
    path = "/admin/analytics/daily",
    tag = "Analytics",
    params(ArchiveParams),
    responses(
        (status = 200, description = "Archived rows, oldest first", body = ArchiveResponse),
        (status = 400, description = "Invalid range or scope")
    )
)]
pub async fn list_daily_stats(
    State(state): State<AppState>,
    Query(params): Query<ArchiveParams>,
) -> Result<Json<ArchiveResponse>, AppError> {
    let rows = state.archive.list(&params).await?;
    let count = rows.len();

    Ok(Json(ArchiveResponse { rows, count }))
}

/// One archived day
#[utoipa::path(
    get,
    path = "/admin/analytics/daily/{date}",
    tag = "Analytics",
    params(
        ("date" = NaiveDate, Path, description = "Archived day (YYYY-MM-DD)"),
        DailyStatParams
    ),
    responses(
        (status = 200, description = "Archived row", body = DailyStat),
        (status = 404, description = "Day not archived")
    )
)]
pub async fn get_daily_stat(
    State(state): State<AppState>,
    Path(date): Path<NaiveDate>,
    Query(params): Query<DailyStatParams>,
) -> Result<Json<DailyStat>, AppError> {
    let stat = state.archive.find(date, params.content_id).await?;
    Ok(Json(stat))
}

/// Run the daily archival now
///
/// Safe to call repeatedly; a day that was already archived and cleared is
/// a no-op.
#[utoipa::path(
    post,
    path = "/admin/analytics/jobs/archive",
    tag = "Jobs",
    params(ArchiveJobParams),
    responses(
        (status = 200, description = "Archival finished", body = ArchiveJobResponse),
        (status = 500, description = "Store error")
    )
)]
pub async fn run_archival_job(
    State(state): State<AppState>,
    Query(params): Query<ArchiveJobParams>,
) -> Result<Json<ArchiveJobResponse>, AppError> {
    let date = params
        .date
        .or_else(|| state.rollup.yesterday())
        .ok_or_else(|| AppError::Internal("Clock has no previous day".to_string()))?;

    info!("Manual archival requested for {}", date);
    let archived = state.rollup.archive_day(date).await?;

    Ok(Json(ArchiveJobResponse { date, archived }))
}

/// Trim the leaderboard now
#[utoipa::path(
    post,
    path = "/admin/analytics/jobs/trim",
    tag = "Jobs",
    responses(
        (status = 200, description = "Trim finished", body = TrimJobResponse),
        (status = 500, description = "Store error")
    )
)]
pub async fn run_trim_job(
    State(state): State<AppState>,
) -> Result<Json<TrimJobResponse>, AppError> {
    info!("Manual leaderboard trim requested");
    let removed = state.rollup.run_hourly_trim().await?;
    Ok(Json(TrimJobResponse { removed }))
}

pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    let counters_ok = state.counters.ping().await.is_ok();
    let database_ok = state.database.ping().await.is_ok();
    let healthy = counters_ok && database_ok;

    state.metrics.refresh_uptime();

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "status": if healthy { "healthy" } else { "unhealthy" },
            "service": "view-analytics-service",
            "version": env!("CARGO_PKG_VERSION"),
            "uptime_seconds": state.metrics.uptime_seconds(),
            "counter_store": {
                "backend": state.counters.backend(),
                "status": if counters_ok { "connected" } else { "disconnected" },
            },
            "database": {
                "status": if database_ok { "connected" } else { "disconnected" },
            },
            "metrics": {
                "views_recorded": state.metrics.views_recorded(),
                "record_failures": state.metrics.record_failures(),
            }
        })),
    )
}
