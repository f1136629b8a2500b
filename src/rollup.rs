//! Rollup jobs: fold yesterday's transient counters into a durable row, and
//! keep the leaderboard bounded. Both are stateless and safe to rerun.
//!
//! Archival reads the counters and deletes them afterwards without an atomic
//! read-and-clear, so a view landing between the read and the delete of the
//! previous day's keys is lost. Late views for a past day are rare (the write
//! path stamps events with the current date) and the window is accepted.

use crate::clock::Clock;
use crate::counter_store::CounterStore;
use crate::durable::StatRepository;
use crate::error::StoreError;
use crate::keys;
use crate::metrics::MetricsState;
use crate::models::DailyStat;
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const DEFAULT_LEADERBOARD_SIZE: u64 = 100;

pub struct RollupJobs {
    counters: Arc<dyn CounterStore>,
    stats: Arc<dyn StatRepository>,
    clock: Arc<dyn Clock>,
    metrics: MetricsState,
    leaderboard_size: u64,
}

impl RollupJobs {
    pub fn new(
        counters: Arc<dyn CounterStore>,
        stats: Arc<dyn StatRepository>,
        clock: Arc<dyn Clock>,
        metrics: MetricsState,
        leaderboard_size: u64,
    ) -> Self {
        Self {
            counters,
            stats,
            clock,
            metrics,
            leaderboard_size,
        }
    }

    pub fn yesterday(&self) -> Option<NaiveDate> {
        self.clock.today().pred_opt()
    }

    /// Archive yesterday. Returns the row written, or `None` for a day with
    /// nothing left to archive.
    pub async fn run_daily_archival(&self) -> Result<Option<DailyStat>, StoreError> {
        let Some(target) = self.yesterday() else {
            warn!("No previous day to archive before {}", self.clock.today());
            return Ok(None);
        };
        self.archive_day(target).await
    }

    pub async fn archive_day(&self, date: NaiveDate) -> Result<Option<DailyStat>, StoreError> {
        let result = self.archive(date).await;
        let outcome = match &result {
            Ok(Some(_)) => "archived",
            Ok(None) => "empty",
            Err(_) => "failed",
        };
        self.metrics.archival_run(outcome);
        result
    }

    async fn archive(&self, date: NaiveDate) -> Result<Option<DailyStat>, StoreError> {
        let pv_key = keys::page_views_key(date);
        let uv_key = keys::unique_visitors_key(date);

        let page_views = keys::parse_counter(self.counters.get(&pv_key).await?.as_deref());
        let unique_visitors = self.counters.pfcount(&uv_key).await?;

        if page_views == 0 && unique_visitors == 0 {
            // Residual keys from a half-finished run are still removed.
            self.cleanup(&pv_key, &uv_key).await?;
            debug!("No traffic to archive for {}", date);
            return Ok(None);
        }

        let mut stat = self
            .stats
            .find_daily_stat(date, None)
            .await?
            .unwrap_or_else(|| DailyStat::site_wide(date));
        stat.page_views = keys::clamp_to_column(page_views);
        stat.unique_visitors = keys::clamp_to_column(unique_visitors);

        let saved = self.stats.upsert_daily_stat(stat).await?;
        self.cleanup(&pv_key, &uv_key).await?;

        info!(
            "Archived {}: {} page views, {} unique visitors",
            date, saved.page_views, saved.unique_visitors
        );
        Ok(Some(saved))
    }

    /// Both keys go in one command. Clearing only one would make a retry see
    /// a half-empty day and overwrite the row already written.
    async fn cleanup(&self, pv_key: &str, uv_key: &str) -> Result<(), StoreError> {
        self.counters.del(&[pv_key, uv_key]).await
    }

    /// Drop the lowest-scoring entries beyond the ceiling; returns how many.
    pub async fn run_hourly_trim(&self) -> Result<u64, StoreError> {
        let size = self.counters.zcard(keys::LEADERBOARD_KEY).await?;
        if size <= self.leaderboard_size {
            self.metrics.leaderboard_trimmed(0, size);
            return Ok(0);
        }

        let last_rank = (size - self.leaderboard_size - 1) as isize;
        let removed = self
            .counters
            .zremrangebyrank(keys::LEADERBOARD_KEY, 0, last_rank)
            .await?;

        self.metrics.leaderboard_trimmed(removed, size);
        info!("Leaderboard trimmed: removed {} of {} entries", removed, size);
        Ok(removed)
    }
}
