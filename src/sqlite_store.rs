use crate::durable::{ContentDirectory, StatRepository};
use crate::error::StoreError;
use crate::models::{ArchiveQuery, ArchiveScope, ContentSummary, DailyStat};
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};

mod schema {
    pub const CREATE_DAILY_STATS_TABLE: &str = r#"
        CREATE TABLE IF NOT EXISTS daily_stats (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            stat_date TEXT NOT NULL,
            content_id INTEGER NULL CHECK (content_id IS NULL OR content_id > 0),
            page_views INTEGER NOT NULL DEFAULT 0 CHECK (page_views >= 0),
            unique_visitors INTEGER NOT NULL DEFAULT 0 CHECK (unique_visitors >= 0)
        )
    "#;

    // SQLite treats NULLs as distinct in UNIQUE constraints, so the
    // site-wide row is folded onto 0, which no content id may take.
    pub const CREATE_DAILY_STATS_UNIQUE_INDEX: &str = r#"
        CREATE UNIQUE INDEX IF NOT EXISTS uk_daily_stats_date_content
        ON daily_stats (stat_date, IFNULL(content_id, 0))
    "#;
}

type DailyStatRow = (NaiveDate, Option<i64>, i64, i64);

fn to_stat((stat_date, content_id, page_views, unique_visitors): DailyStatRow) -> DailyStat {
    DailyStat {
        stat_date,
        content_id,
        page_views: page_views.clamp(0, i64::from(u32::MAX)) as u32,
        unique_visitors: unique_visitors.clamp(0, i64::from(u32::MAX)) as u32,
    }
}

/// Durable store on SQLite. Owns `daily_stats`; reads and bumps the content
/// service's `posts` table and counts its `comments`.
#[derive(Clone)]
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .acquire_timeout(Duration::from_secs(10))
            .connect(database_url)
            .await?;
        info!("Connected to database at {}", database_url);
        Ok(Self { pool })
    }

    #[cfg(test)]
    pub fn from_pool(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(schema::CREATE_DAILY_STATS_TABLE)
            .execute(&self.pool)
            .await?;
        sqlx::query(schema::CREATE_DAILY_STATS_UNIQUE_INDEX)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl StatRepository for SqliteStore {
    async fn find_daily_stat(
        &self,
        stat_date: NaiveDate,
        content_id: Option<i64>,
    ) -> Result<Option<DailyStat>, StoreError> {
        let row: Option<DailyStatRow> = sqlx::query_as(
            "SELECT stat_date, content_id, page_views, unique_visitors \
             FROM daily_stats WHERE stat_date = ? AND content_id IS ?",
        )
        .bind(stat_date)
        .bind(content_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(to_stat))
    }

    async fn upsert_daily_stat(&self, stat: DailyStat) -> Result<DailyStat, StoreError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE daily_stats SET page_views = ?, unique_visitors = ? \
             WHERE stat_date = ? AND content_id IS ?",
        )
        .bind(i64::from(stat.page_views))
        .bind(i64::from(stat.unique_visitors))
        .bind(stat.stat_date)
        .bind(stat.content_id)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            sqlx::query(
                "INSERT INTO daily_stats (stat_date, content_id, page_views, unique_visitors) \
                 VALUES (?, ?, ?, ?)",
            )
            .bind(stat.stat_date)
            .bind(stat.content_id)
            .bind(i64::from(stat.page_views))
            .bind(i64::from(stat.unique_visitors))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!(
            "Daily stat saved: {} content={:?} pv={} uv={}",
            stat.stat_date, stat.content_id, stat.page_views, stat.unique_visitors
        );

        Ok(stat)
    }

    async fn list_daily_stats(&self, query: &ArchiveQuery) -> Result<Vec<DailyStat>, StoreError> {
        let mut sql = String::from(
            "SELECT stat_date, content_id, page_views, unique_visitors \
             FROM daily_stats WHERE stat_date >= ? AND stat_date <= ?",
        );
        match query.scope {
            ArchiveScope::All => {}
            ArchiveScope::SiteWide => sql.push_str(" AND content_id IS NULL"),
            ArchiveScope::Content(_) => sql.push_str(" AND content_id = ?"),
        }
        sql.push_str(" ORDER BY stat_date ASC, content_id IS NOT NULL, content_id ASC LIMIT ?");

        let mut rows = sqlx::query_as::<_, DailyStatRow>(&sql)
            .bind(query.from)
            .bind(query.to);
        if let ArchiveScope::Content(content_id) = query.scope {
            rows = rows.bind(content_id);
        }

        let rows = rows
            .bind(i64::from(query.limit))
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(to_stat).collect())
    }
}

#[async_trait]
impl ContentDirectory for SqliteStore {
    async fn bump_lifetime_view_count(
        &self,
        content_id: i64,
        delta: i64,
    ) -> Result<(), StoreError> {
        // Autocommit on a pool connection: independent of any caller transaction.
        let result = sqlx::query(
            "UPDATE posts SET view_count = COALESCE(view_count, 0) + ? WHERE id = ?",
        )
        .bind(delta)
        .bind(content_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            debug!("No content row {} to bump view count for", content_id);
        }
        Ok(())
    }

    async fn resolve_content_summaries(
        &self,
        ids: &[i64],
    ) -> Result<HashMap<i64, ContentSummary>, StoreError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "SELECT id, title, slug, COALESCE(view_count, 0) FROM posts \
             WHERE deleted_at IS NULL AND id IN ({})",
            placeholders
        );

        let mut query = sqlx::query_as::<_, (i64, String, String, i64)>(&sql);
        for id in ids {
            query = query.bind(*id);
        }

        let rows = query.fetch_all(&self.pool).await?;

        Ok(rows
            .into_iter()
            .map(|(content_id, title, slug, lifetime_view_count)| {
                (
                    content_id,
                    ContentSummary {
                        content_id,
                        title,
                        slug,
                        lifetime_view_count,
                    },
                )
            })
            .collect())
    }

    async fn count_published(&self) -> Result<u64, StoreError> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM posts WHERE status = 'published' AND deleted_at IS NULL",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(count.max(0) as u64)
    }

    async fn count_pending_moderation(&self) -> Result<u64, StoreError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM comments WHERE status = 'pending'")
                .fetch_one(&self.pool)
                .await?;
        Ok(count.max(0) as u64)
    }
}
