//! Time-based triggers for the rollup jobs.
//!
//! Each job owns one Tokio task and runs to completion before its next
//! sleep, so the same job never overlaps itself. The two jobs are
//! independent and may overlap each other and the write path.

use crate::alerts::WebhookAlerts;
use crate::rollup::RollupJobs;
use chrono::{Duration as ChronoDuration, Local, NaiveDateTime, NaiveTime, Timelike};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Next daily fire time strictly after `now`.
pub fn next_daily_run(now: NaiveDateTime, at: NaiveTime) -> NaiveDateTime {
    let today = now.date().and_time(at);
    if today > now {
        today
    } else {
        today + ChronoDuration::days(1)
    }
}

/// Next top of the hour strictly after `now`.
pub fn next_hourly_run(now: NaiveDateTime) -> NaiveDateTime {
    let hour_start = now
        .date()
        .and_hms_opt(now.hour(), 0, 0)
        .unwrap_or(now);
    hour_start + ChronoDuration::hours(1)
}

fn sleep_until(next: NaiveDateTime) -> Duration {
    (next - Local::now().naive_local())
        .to_std()
        .unwrap_or(Duration::ZERO)
}

pub struct Scheduler {
    jobs: Arc<RollupJobs>,
    alerts: WebhookAlerts,
    archive_at: NaiveTime,
}

impl Scheduler {
    pub fn new(jobs: Arc<RollupJobs>, alerts: WebhookAlerts, archive_at: NaiveTime) -> Self {
        Self {
            jobs,
            alerts,
            archive_at,
        }
    }

    pub fn spawn(self) -> Vec<JoinHandle<()>> {
        let archival = {
            let jobs = self.jobs.clone();
            let alerts = self.alerts.clone();
            let at = self.archive_at;
            tokio::spawn(async move {
                loop {
                    let next = next_daily_run(Local::now().naive_local(), at);
                    info!("Next daily archival at {}", next);
                    tokio::time::sleep(sleep_until(next)).await;
                    run_archival(&jobs, &alerts).await;
                }
            })
        };

        let trim = {
            let jobs = self.jobs;
            let alerts = self.alerts;
            tokio::spawn(async move {
                loop {
                    let next = next_hourly_run(Local::now().naive_local());
                    tokio::time::sleep(sleep_until(next)).await;
                    run_trim(&jobs, &alerts).await;
                }
            })
        };

        vec![archival, trim]
    }
}

async fn run_archival(jobs: &RollupJobs, alerts: &WebhookAlerts) {
    match jobs.run_daily_archival().await {
        Ok(Some(stat)) => alerts.send_daily_report(&stat).await,
        Ok(None) => info!("Daily archival found no traffic"),
        Err(e) => {
            error!("Daily archival failed: {}", e);
            alerts.alert_job_failed("Daily archival", &e.to_string()).await;
        }
    }
}

async fn run_trim(jobs: &RollupJobs, alerts: &WebhookAlerts) {
    match jobs.run_hourly_trim().await {
        Ok(removed) => alerts.alert_leaderboard_trimmed(removed).await,
        Err(e) => {
            error!("Leaderboard trim failed: {}", e);
            alerts.alert_job_failed("Leaderboard trim", &e.to_string()).await;
        }
    }
}
