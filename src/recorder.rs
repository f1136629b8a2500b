//! Write path: one call per content view.
//!
//! Every step is a single atomic command against its store and is attempted
//! independently. A failing step is logged and counted, never returned; view
//! recording is a side channel and must not fail the page that triggered it.

use crate::clock::Clock;
use crate::counter_store::CounterStore;
use crate::durable::ContentDirectory;
use crate::error::StoreError;
use crate::keys;
use crate::metrics::MetricsState;
use crate::visitor::VisitorIdentity;
use chrono::NaiveDate;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Transient daily keys must outlive the next day's archival pass.
pub const MIN_DAILY_COUNTER_TTL: Duration = Duration::from_secs(48 * 3600);

#[derive(Clone)]
pub struct ViewRecorder {
    counters: Arc<dyn CounterStore>,
    content: Arc<dyn ContentDirectory>,
    clock: Arc<dyn Clock>,
    metrics: MetricsState,
    daily_ttl: Duration,
}

impl ViewRecorder {
    pub fn new(
        counters: Arc<dyn CounterStore>,
        content: Arc<dyn ContentDirectory>,
        clock: Arc<dyn Clock>,
        metrics: MetricsState,
        daily_ttl: Duration,
    ) -> Self {
        Self {
            counters,
            content,
            clock,
            metrics,
            daily_ttl: daily_ttl.max(MIN_DAILY_COUNTER_TTL),
        }
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    pub async fn record_view(
        &self,
        content_id: Option<i64>,
        visitor: &VisitorIdentity,
        date: NaiveDate,
    ) {
        let Some(content_id) = content_id else {
            return;
        };

        if let Err(e) = self.bump_page_views(date).await {
            self.step_failed("page_views", content_id, &e);
        }

        if let Err(e) = self.add_unique_visitor(date, visitor).await {
            self.step_failed("unique_visitors", content_id, &e);
        }

        if let Err(e) = self
            .counters
            .zincrby(keys::LEADERBOARD_KEY, &keys::leaderboard_member(content_id), 1.0)
            .await
        {
            self.step_failed("leaderboard", content_id, &e);
        }

        if let Err(e) = self.content.bump_lifetime_view_count(content_id, 1).await {
            self.step_failed("lifetime_count", content_id, &e);
        }

        self.metrics.view_recorded();
        debug!("View recorded: content={} visitor={} date={}", content_id, visitor, date);
    }

    /// Record on a background task so the caller never waits on the stores.
    pub fn record_view_detached(
        &self,
        content_id: Option<i64>,
        visitor: VisitorIdentity,
        date: NaiveDate,
    ) -> JoinHandle<()> {
        let recorder = self.clone();
        tokio::spawn(async move {
            recorder.record_view(content_id, &visitor, date).await;
        })
    }

    async fn bump_page_views(&self, date: NaiveDate) -> Result<(), StoreError> {
        let key = keys::page_views_key(date);
        self.counters.incr(&key, 1).await?;
        self.counters.expire(&key, self.daily_ttl).await
    }

    async fn add_unique_visitor(
        &self,
        date: NaiveDate,
        visitor: &VisitorIdentity,
    ) -> Result<(), StoreError> {
        let key = keys::unique_visitors_key(date);
        self.counters.pfadd(&key, visitor.as_str()).await?;
        self.counters.expire(&key, self.daily_ttl).await
    }

    fn step_failed(&self, step: &'static str, content_id: i64, error: &StoreError) {
        self.metrics.record_step_failed(step);
        warn!(
            "View recording step '{}' failed for content {}: {}",
            step, content_id, error
        );
    }
}
