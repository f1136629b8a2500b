use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod alerts;
mod archive;
mod clock;
mod config;
mod counter_store;
mod durable;
mod error;
mod handlers;
mod keys;
#[cfg(test)]
mod memory_store;
mod metrics;
mod metrics_middleware;
mod models;
mod overview;
mod recorder;
mod redis_store;
mod rollup;
mod scheduler;
mod sqlite_store;
#[cfg(test)]
mod test_support;
mod visitor;

use alerts::{AlertLevel, WebhookAlerts};
use archive::ArchiveReader;
use clock::{Clock, SystemClock};
use config::Config;
use counter_store::CounterStore;
use handlers::ApiDoc;
use metrics::MetricsState;
use overview::OverviewAssembler;
use recorder::ViewRecorder;
use redis_store::RedisCounterStore;
use rollup::RollupJobs;
use scheduler::Scheduler;
use sqlite_store::SqliteStore;

#[derive(Clone)]
pub struct AppState {
    recorder: ViewRecorder,
    overview: Arc<OverviewAssembler>,
    rollup: Arc<RollupJobs>,
    archive: ArchiveReader,
    counters: Arc<dyn CounterStore>,
    database: SqliteStore,
    metrics: MetricsState,
}

impl AppState {
    /// Wire the recorder, overview, rollups and archive reader over one
    /// counter store, one durable store and one clock.
    pub fn new(
        config: &Config,
        counters: Arc<dyn CounterStore>,
        database: SqliteStore,
        clock: Arc<dyn Clock>,
        metrics: MetricsState,
    ) -> Self {
        let durable = Arc::new(database.clone());

        let recorder = ViewRecorder::new(
            counters.clone(),
            durable.clone(),
            clock.clone(),
            metrics.clone(),
            config.daily_counter_ttl,
        );
        let overview = OverviewAssembler::new(
            counters.clone(),
            durable.clone(),
            clock.clone(),
            config.overview_top_n,
        );
        let rollup = RollupJobs::new(
            counters.clone(),
            durable.clone(),
            clock.clone(),
            metrics.clone(),
            config.leaderboard_size,
        );
        let archive = ArchiveReader::new(durable, clock);

        Self {
            recorder,
            overview: Arc::new(overview),
            rollup: Arc::new(rollup),
            archive,
            counters,
            database,
            metrics,
        }
    }
}

/// Application routes. `/metrics` is added in `main` since it needs the
/// process-wide Prometheus handle.
pub fn router(state: AppState) -> Router {
    let metrics = state.metrics.clone();

    Router::new()
        .route("/views", post(handlers::record_view))
        .route("/admin/analytics/overview", get(handlers::get_overview))
        .route("/admin/analytics/daily", get(handlers::list_daily_stats))
        .route("/admin/analytics/daily/:date", get(handlers::get_daily_stat))
        .route(
            "/admin/analytics/jobs/archive",
            post(handlers::run_archival_job),
        )
        .route("/admin/analytics/jobs/trim", post(handlers::run_trim_job))
        .route("/health", get(handlers::health_check))
        .with_state(state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(axum::middleware::from_fn_with_state(
            metrics,
            metrics_middleware::metrics_middleware,
        ))
        .layer(
            tower_http::trace::TraceLayer::new_for_http()
                .make_span_with(tower_http::trace::DefaultMakeSpan::new())
                .on_response(tower_http::trace::DefaultOnResponse::new()),
        )
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "view_analytics_service=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    info!("Configuration loaded: {:?}", config);

    let prometheus_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus recorder: {}", e))?;
    info!("Prometheus metrics exporter initialized");

    let metrics = MetricsState::new();
    let alerts = WebhookAlerts::new(config.webhook_url.clone());

    // Durable store
    let database = match SqliteStore::connect(&config.database_url).await {
        Ok(store) => store,
        Err(e) => {
            let error_msg = format!("Failed to connect to database: {}", e);
            error!("{}", error_msg);
            alerts
                .send_alert(AlertLevel::Error, "Database Connection Failed", &error_msg)
                .await;
            return Err(e.into());
        }
    };
    database.run_migrations().await?;
    info!("daily_stats schema is ready");

    // Counter store
    let counters: Arc<dyn CounterStore> = match RedisCounterStore::connect(&config.redis_url).await {
        Ok(store) => Arc::new(store),
        Err(e) => {
            let error_msg = format!("Failed to connect to Redis: {}", e);
            error!("{}", error_msg);
            alerts
                .send_alert(AlertLevel::Error, "Counter Store Connection Failed", &error_msg)
                .await;
            return Err(e.into());
        }
    };

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let state = AppState::new(&config, counters, database, clock, metrics);

    if config.enable_scheduler {
        let handles =
            Scheduler::new(state.rollup.clone(), alerts.clone(), config.archive_at).spawn();
        info!(
            "Scheduler started: {} jobs, daily archival at {}",
            handles.len(),
            config.archive_at
        );
    } else {
        info!("Scheduler disabled; rollups run only through the job endpoints");
    }

    alerts.alert_service_started(env!("CARGO_PKG_VERSION")).await;

    let app = router(state).route(
        "/metrics",
        get(move || async move { prometheus_handle.render() }),
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
