use crate::clock::Clock;
use crate::durable::StatRepository;
use crate::error::AppError;
use crate::models::{ArchiveParams, ArchiveQuery, ArchiveScope, DailyStat};
use chrono::{Days, NaiveDate};
use std::sync::Arc;

/// Default window when the caller gives no `from`
const DEFAULT_WINDOW_DAYS: u64 = 30;
const MAX_LIMIT: u32 = 5000;

/// Historical read path over the durable rows.
#[derive(Clone)]
pub struct ArchiveReader {
    stats: Arc<dyn StatRepository>,
    clock: Arc<dyn Clock>,
}

impl ArchiveReader {
    pub fn new(stats: Arc<dyn StatRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { stats, clock }
    }

    /// Turn request parameters into a bounded query. Today is excluded by
    /// default since it has not been archived yet.
    pub fn query_for(&self, params: &ArchiveParams) -> Result<ArchiveQuery, AppError> {
        let today = self.clock.today();
        let to = params.to.unwrap_or_else(|| today.pred_opt().unwrap_or(today));
        let from = params
            .from
            .unwrap_or_else(|| to.checked_sub_days(Days::new(DEFAULT_WINDOW_DAYS)).unwrap_or(to));

        if from > to {
            return Err(AppError::InvalidRequest(format!(
                "from ({}) must not be after to ({})",
                from, to
            )));
        }

        let scope = match (params.content_id, params.site_wide) {
            (Some(_), true) => {
                return Err(AppError::InvalidRequest(
                    "content_id and site_wide are mutually exclusive".to_string(),
                ))
            }
            (Some(id), false) => ArchiveScope::Content(id),
            (None, true) => ArchiveScope::SiteWide,
            (None, false) => ArchiveScope::All,
        };

        if params.limit == 0 {
            return Err(AppError::InvalidRequest("limit must be positive".to_string()));
        }

        Ok(ArchiveQuery {
            from,
            to,
            scope,
            limit: params.limit.min(MAX_LIMIT),
        })
    }

    pub async fn list(&self, params: &ArchiveParams) -> Result<Vec<DailyStat>, AppError> {
        let query = self.query_for(params)?;
        Ok(self.stats.list_daily_stats(&query).await?)
    }

    pub async fn find(
        &self,
        date: NaiveDate,
        content_id: Option<i64>,
    ) -> Result<DailyStat, AppError> {
        self.stats
            .find_daily_stat(date, content_id)
            .await?
            .ok_or_else(|| match content_id {
                Some(id) => AppError::NotFound(format!("No archived row for {} content {}", date, id)),
                None => AppError::NotFound(format!("No archived row for {}", date)),
            })
    }
}
