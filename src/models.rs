use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// One exact, permanent daily statistics row.
/// `content_id == None` is the site-wide aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DailyStat {
    pub stat_date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_id: Option<i64>,
    pub page_views: u32,
    pub unique_visitors: u32,
}

impl DailyStat {
    pub fn site_wide(stat_date: NaiveDate) -> Self {
        Self {
            stat_date,
            content_id: None,
            page_views: 0,
            unique_visitors: 0,
        }
    }
}

/// Display data for a content item, owned by the content service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentSummary {
    pub content_id: i64,
    pub title: String,
    pub slug: String,
    pub lifetime_view_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct LeaderboardEntry {
    pub content_id: i64,
    pub title: String,
    pub slug: String,
    pub lifetime_view_count: i64,
    /// Leaderboard score at read time, truncated to an integer
    pub score: i64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OverviewSnapshot {
    pub today_page_views: u64,
    pub today_unique_visitors: u64,
    pub published_count: u64,
    pub pending_moderation_count: u64,
    pub leaderboard: Vec<LeaderboardEntry>,
}

/// Which durable rows an archive read returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArchiveScope {
    /// Site-wide and per-content rows
    #[default]
    All,
    SiteWide,
    Content(i64),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveQuery {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub scope: ArchiveScope,
    pub limit: u32,
}

// ---- HTTP request/response bodies ----

#[derive(Debug, Deserialize, ToSchema)]
pub struct RecordViewRequest {
    /// Missing ids are accepted and ignored
    pub content_id: Option<i64>,
    #[serde(default)]
    pub user_id: Option<i64>,
    /// Overrides the address derived from proxy headers
    #[serde(default)]
    pub client_ip: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ArchiveParams {
    /// First day, inclusive (defaults to 30 days before `to`)
    pub from: Option<NaiveDate>,
    /// Last day, inclusive (defaults to yesterday)
    pub to: Option<NaiveDate>,
    /// Restrict to one content item
    pub content_id: Option<i64>,
    /// Only the site-wide rows
    #[serde(default)]
    pub site_wide: bool,
    #[serde(default = "default_archive_limit")]
    pub limit: u32,
}

pub fn default_archive_limit() -> u32 {
    366
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DailyStatParams {
    /// Per-content row instead of the site-wide one
    pub content_id: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ArchiveResponse {
    pub rows: Vec<DailyStat>,
    pub count: usize,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ArchiveJobParams {
    /// Day to archive (defaults to yesterday)
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ArchiveJobResponse {
    pub date: NaiveDate,
    /// `None` when the day had no traffic left to archive
    pub archived: Option<DailyStat>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TrimJobResponse {
    pub removed: u64,
}
