use crate::error::StoreError;
use crate::models::{ArchiveQuery, ContentSummary, DailyStat};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;

/// Durable daily statistics, one row per `(stat_date, content_id)`.
#[async_trait]
pub trait StatRepository: Send + Sync {
    async fn find_daily_stat(
        &self,
        stat_date: NaiveDate,
        content_id: Option<i64>,
    ) -> Result<Option<DailyStat>, StoreError>;

    /// Insert or overwrite the row for the stat's key (last write wins).
    async fn upsert_daily_stat(&self, stat: DailyStat) -> Result<DailyStat, StoreError>;

    /// Rows in `from..=to`, oldest first.
    async fn list_daily_stats(&self, query: &ArchiveQuery) -> Result<Vec<DailyStat>, StoreError>;
}

/// The slice of the content service the analytics core depends on.
#[async_trait]
pub trait ContentDirectory: Send + Sync {
    /// Runs in its own unit of work, never inside a caller's transaction.
    async fn bump_lifetime_view_count(&self, content_id: i64, delta: i64)
        -> Result<(), StoreError>;

    /// Ids that no longer resolve are simply absent from the map.
    async fn resolve_content_summaries(
        &self,
        ids: &[i64],
    ) -> Result<HashMap<i64, ContentSummary>, StoreError>;

    async fn count_published(&self) -> Result<u64, StoreError>;

    async fn count_pending_moderation(&self) -> Result<u64, StoreError>;
}
