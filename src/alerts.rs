use serde_json::json;
use tracing::{error, info};

use crate::models::DailyStat;

/// Webhook reports for the rollup jobs (Discord/Slack embed format).
#[derive(Clone)]
pub struct WebhookAlerts {
    webhook_url: Option<String>,
    client: reqwest::Client,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertLevel {
    Info,
    Warning,
    Error,
}

impl AlertLevel {
    fn color(self) -> u32 {
        match self {
            AlertLevel::Info => 0x3498db,
            AlertLevel::Warning => 0xf39c12,
            AlertLevel::Error => 0xe74c3c,
        }
    }
}

impl WebhookAlerts {
    pub fn new(webhook_url: Option<String>) -> Self {
        Self {
            webhook_url,
            client: reqwest::Client::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.webhook_url.is_some()
    }

    async fn post(&self, payload: serde_json::Value, what: &str) {
        let Some(webhook_url) = self.webhook_url.as_deref() else {
            return;
        };

        match self.client.post(webhook_url).json(&payload).send().await {
            Ok(response) if response.status().is_success() => {
                info!("Webhook sent: {}", what);
            }
            Ok(response) => {
                error!("Failed to send webhook '{}': HTTP {}", what, response.status());
            }
            Err(e) => {
                error!("Failed to send webhook '{}': {}", what, e);
            }
        }
    }

    pub async fn send_alert(&self, level: AlertLevel, title: &str, message: &str) {
        if !self.is_enabled() {
            return;
        }

        let payload = json!({
            "embeds": [{
                "title": title,
                "description": message,
                "color": level.color(),
                "timestamp": chrono::Utc::now().to_rfc3339(),
                "footer": { "text": "View Analytics Service" }
            }]
        });

        self.post(payload, title).await;
    }

    pub async fn alert_service_started(&self, version: &str) {
        self.send_alert(
            AlertLevel::Info,
            "Service Started",
            &format!("View analytics service v{} is now online", version),
        )
        .await;
    }

    pub async fn alert_job_failed(&self, job: &str, error: &str) {
        self.send_alert(
            AlertLevel::Error,
            "Rollup Job Failed",
            &format!("{} failed: {}", job, error),
        )
        .await;
    }

    pub async fn alert_leaderboard_trimmed(&self, removed: u64) {
        if removed == 0 {
            return;
        }
        self.send_alert(
            AlertLevel::Warning,
            "Leaderboard Trimmed",
            &format!("Removed {} low-scoring entries", removed),
        )
        .await;
    }

    /// Report the durable row written by the daily archival.
    pub async fn send_daily_report(&self, stat: &DailyStat) {
        if !self.is_enabled() {
            return;
        }

        let payload = json!({
            "embeds": [{
                "title": "Daily Traffic Report",
                "description": format!("Archived statistics for `{}`", stat.stat_date),
                "color": 0x2ecc71,
                "fields": [
                    {
                        "name": "Page Views",
                        "value": format!("**{}**", group_thousands(u64::from(stat.page_views))),
                        "inline": true
                    },
                    {
                        "name": "Unique Visitors",
                        "value": format!("**{}**", group_thousands(u64::from(stat.unique_visitors))),
                        "inline": true
                    }
                ],
                "timestamp": chrono::Utc::now().to_rfc3339(),
                "footer": { "text": "View Analytics Service · Daily Report" }
            }]
        });

        self.post(payload, "daily report").await;
    }
}

fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
