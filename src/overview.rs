use crate::clock::Clock;
use crate::counter_store::CounterStore;
use crate::durable::ContentDirectory;
use crate::error::StoreError;
use crate::keys;
use crate::models::{LeaderboardEntry, OverviewSnapshot};
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::warn;

pub const DEFAULT_TOP_N: usize = 5;

/// Read path for the dashboard. Transient counters degrade to zero; only
/// the content service's own failures are surfaced.
pub struct OverviewAssembler {
    counters: Arc<dyn CounterStore>,
    content: Arc<dyn ContentDirectory>,
    clock: Arc<dyn Clock>,
    top_n: usize,
}

impl OverviewAssembler {
    pub fn new(
        counters: Arc<dyn CounterStore>,
        content: Arc<dyn ContentDirectory>,
        clock: Arc<dyn Clock>,
        top_n: usize,
    ) -> Self {
        Self {
            counters,
            content,
            clock,
            top_n,
        }
    }

    pub async fn get_overview(&self) -> Result<OverviewSnapshot, StoreError> {
        let today = self.clock.today();

        let today_page_views = self.page_views(today).await;
        let today_unique_visitors = self.unique_visitors(today).await;
        let published_count = self.content.count_published().await?;
        let pending_moderation_count = self.content.count_pending_moderation().await?;
        let leaderboard = self.leaderboard().await?;

        Ok(OverviewSnapshot {
            today_page_views,
            today_unique_visitors,
            published_count,
            pending_moderation_count,
            leaderboard,
        })
    }

    async fn page_views(&self, date: NaiveDate) -> u64 {
        match self.counters.get(&keys::page_views_key(date)).await {
            Ok(value) => keys::parse_counter(value.as_deref()),
            Err(e) => {
                warn!("Could not read page views for {}: {}", date, e);
                0
            }
        }
    }

    async fn unique_visitors(&self, date: NaiveDate) -> u64 {
        self.counters
            .pfcount(&keys::unique_visitors_key(date))
            .await
            .unwrap_or_else(|e| {
                warn!("Could not read unique visitors for {}: {}", date, e);
                0
            })
    }

    /// Top entries by descending score. Equal scores keep the store's native
    /// order (reverse lexicographic on Redis); that order is not guaranteed.
    async fn leaderboard(&self) -> Result<Vec<LeaderboardEntry>, StoreError> {
        if self.top_n == 0 {
            return Ok(Vec::new());
        }

        let ranked = match self
            .counters
            .zrevrange_with_scores(keys::LEADERBOARD_KEY, 0, self.top_n as isize - 1)
            .await
        {
            Ok(ranked) => ranked,
            Err(e) => {
                warn!("Could not read leaderboard: {}", e);
                return Ok(Vec::new());
            }
        };

        let ranked: Vec<(i64, f64)> = ranked
            .iter()
            .filter_map(|(member, score)| {
                keys::parse_leaderboard_member(member).map(|id| (id, *score))
            })
            .collect();
        if ranked.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<i64> = ranked.iter().map(|(id, _)| *id).collect();
        let mut summaries = self.content.resolve_content_summaries(&ids).await?;

        Ok(ranked
            .into_iter()
            .filter_map(|(id, score)| {
                summaries.remove(&id).map(|summary| LeaderboardEntry {
                    content_id: id,
                    title: summary.title,
                    slug: summary.slug,
                    lifetime_view_count: summary.lifetime_view_count,
                    score: score.trunc() as i64,
                })
            })
            .collect())
    }
}
