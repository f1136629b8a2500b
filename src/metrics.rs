use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Process-level analytics metrics, exported through Prometheus.
#[derive(Clone)]
pub struct MetricsState {
    start_time: Arc<Instant>,
    views_recorded: Arc<AtomicU64>,
    record_failures: Arc<AtomicU64>,
}

impl MetricsState {
    pub fn new() -> Self {
        describe_counter!("views_recorded_total", "View events accepted by the recorder");
        describe_counter!(
            "view_record_failures_total",
            "Write-path steps that failed and were skipped"
        );
        describe_counter!("archival_runs_total", "Daily archival runs by outcome");
        describe_counter!("leaderboard_trimmed_total", "Leaderboard entries removed by trimming");
        describe_gauge!("leaderboard_size", "Leaderboard size seen by the last trim");
        describe_gauge!("uptime_seconds", "Service uptime in seconds");
        describe_counter!("http_requests_total", "HTTP requests by route and status");
        describe_histogram!(
            "http_request_duration_seconds",
            "HTTP request duration in seconds"
        );

        Self {
            start_time: Arc::new(Instant::now()),
            views_recorded: Arc::new(AtomicU64::new(0)),
            record_failures: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn view_recorded(&self) {
        self.views_recorded.fetch_add(1, Ordering::Relaxed);
        counter!("views_recorded_total").increment(1);
    }

    pub fn record_step_failed(&self, step: &'static str) {
        self.record_failures.fetch_add(1, Ordering::Relaxed);
        counter!("view_record_failures_total", "step" => step).increment(1);
    }

    pub fn archival_run(&self, outcome: &'static str) {
        counter!("archival_runs_total", "outcome" => outcome).increment(1);
    }

    pub fn leaderboard_trimmed(&self, removed: u64, size: u64) {
        counter!("leaderboard_trimmed_total").increment(removed);
        gauge!("leaderboard_size").set(size.saturating_sub(removed) as f64);
    }

    pub fn http_request(&self, method: String, route: String, status: u16, seconds: f64) {
        histogram!("http_request_duration_seconds", "route" => route.clone()).record(seconds);
        counter!(
            "http_requests_total",
            "method" => method,
            "route" => route,
            "status" => status.to_string()
        )
        .increment(1);
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn views_recorded(&self) -> u64 {
        self.views_recorded.load(Ordering::Relaxed)
    }

    pub fn record_failures(&self) -> u64 {
        self.record_failures.load(Ordering::Relaxed)
    }

    pub fn refresh_uptime(&self) {
        gauge!("uptime_seconds").set(self.uptime_seconds() as f64);
    }
}

impl Default for MetricsState {
    fn default() -> Self {
        Self::new()
    }
}
