use crate::overview::DEFAULT_TOP_N;
use crate::rollup::DEFAULT_LEADERBOARD_SIZE;
use chrono::NaiveTime;
use std::env;
use std::time::Duration;

/// Counters always live in Redis; the in-process store exists only as a
/// test double.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub redis_url: String,
    pub leaderboard_size: u64,
    pub overview_top_n: usize,
    pub daily_counter_ttl: Duration,
    pub archive_at: NaiveTime,
    pub enable_scheduler: bool,
    pub webhook_url: Option<String>,
}

fn parse_number<T: std::str::FromStr>(name: &str, value: String) -> anyhow::Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid {}: {}", name, e))
}

fn number_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> anyhow::Result<T>
where
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(value) => parse_number(name, value),
        None => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from any variable source; `from_env` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.to_string());

        let ttl_hours: u64 = parse_number("DAILY_COUNTER_TTL_HOURS", var("DAILY_COUNTER_TTL_HOURS", "48"))?;
        if ttl_hours < 48 {
            anyhow::bail!(
                "Invalid DAILY_COUNTER_TTL_HOURS: {} (daily counters must live at least 48 hours)",
                ttl_hours
            );
        }

        let archive_at = NaiveTime::parse_from_str(&var("ARCHIVE_AT", "00:05"), "%H:%M")
            .map_err(|e| anyhow::anyhow!("Invalid ARCHIVE_AT (expected HH:MM): {}", e))?;

        Ok(Self {
            port: parse_number("PORT", var("PORT", "8091"))?,
            database_url: var("DATABASE_URL", "sqlite:analytics.db?mode=rwc"),
            redis_url: var("REDIS_URL", "redis://127.0.0.1:6379"),
            leaderboard_size: number_or(&lookup, "LEADERBOARD_SIZE", DEFAULT_LEADERBOARD_SIZE)?,
            overview_top_n: number_or(&lookup, "OVERVIEW_TOP_N", DEFAULT_TOP_N)?,
            daily_counter_ttl: Duration::from_secs(ttl_hours * 3600),
            archive_at,
            enable_scheduler: var("ENABLE_SCHEDULER", "true").parse().unwrap_or(true),
            webhook_url: lookup("WEBHOOK_URL").filter(|url| !url.trim().is_empty()),
        })
    }

    #[cfg(test)]
    pub fn test_config() -> Self {
        Self {
            port: 8091,
            database_url: "sqlite::memory:".to_string(),
            redis_url: "redis://127.0.0.1:6379".to_string(),
            leaderboard_size: DEFAULT_LEADERBOARD_SIZE,
            overview_top_n: DEFAULT_TOP_N,
            daily_counter_ttl: Duration::from_secs(48 * 3600),
            archive_at: NaiveTime::from_hms_opt(0, 5, 0).unwrap(),
            enable_scheduler: false,
            webhook_url: None,
        }
    }
}
