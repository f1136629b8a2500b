//! Key layout of the fast counter store.
//!
//! - `pv:daily:{date}`: page views for one calendar day (integer string)
//! - `uv:daily:{date}`: unique visitors for one calendar day (HyperLogLog)
//! - `post:ranking:views`: leaderboard, member = decimal content id

use chrono::NaiveDate;

const PAGE_VIEWS_PREFIX: &str = "pv:daily:";
const UNIQUE_VISITORS_PREFIX: &str = "uv:daily:";

/// Sorted set holding the popularity leaderboard
pub const LEADERBOARD_KEY: &str = "post:ranking:views";

#[inline]
pub fn page_views_key(date: NaiveDate) -> String {
    format!("{}{}", PAGE_VIEWS_PREFIX, date)
}

#[inline]
pub fn unique_visitors_key(date: NaiveDate) -> String {
    format!("{}{}", UNIQUE_VISITORS_PREFIX, date)
}

#[inline]
pub fn leaderboard_member(content_id: i64) -> String {
    content_id.to_string()
}

/// Blank or non-numeric members are skipped by readers.
pub fn parse_leaderboard_member(member: &str) -> Option<i64> {
    let trimmed = member.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse().ok()
}

/// Parse a stored counter; missing, negative or garbage values count as zero.
pub fn parse_counter(value: Option<&str>) -> u64 {
    value
        .and_then(|v| v.trim().parse::<i64>().ok())
        .map(|v| v.max(0) as u64)
        .unwrap_or(0)
}

/// Clamp a transient count into the durable `INTEGER` column range.
#[inline]
pub fn clamp_to_column(count: u64) -> u32 {
    u32::try_from(count).unwrap_or(u32::MAX)
}
