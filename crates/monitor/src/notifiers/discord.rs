use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use job_watch_domain::ports::{DeliveryError, NotificationSink};
use job_watch_domain::Address;
use serde_json::{json, Value};

use super::{post_webhook, NOTIFICATION_TITLE};

const EMBED_COLOR: u32 = 5_814_783;

/// Posts an embed to a Discord webhook.
#[derive(Debug, Clone)]
pub struct DiscordNotifier {
    http: reqwest::Client,
    webhook_url: String,
}

impl DiscordNotifier {
    pub fn new(http: reqwest::Client, webhook_url: impl Into<String>) -> Self {
        Self {
            http,
            webhook_url: webhook_url.into(),
        }
    }
}

pub(crate) fn payload(job: &Address, tx_hash: &str, at: DateTime<Utc>) -> Value {
    json!({
        "embeds": [
            {
                "title": format!("🔔 {NOTIFICATION_TITLE}"),
                "color": EMBED_COLOR,
                "fields": [
                    { "name": "Job Address", "value": job.as_str(), "inline": true },
                    { "name": "Tx Hash", "value": tx_hash, "inline": true },
                ],
                "timestamp": at.to_rfc3339_opts(SecondsFormat::Millis, true),
            }
        ]
    })
}

#[async_trait]
impl NotificationSink for DiscordNotifier {
    fn name(&self) -> &str {
        "discord"
    }

    async fn notify(&self, job: &Address, tx_hash: &str) -> Result<(), DeliveryError> {
        let body = payload(job, tx_hash, Utc::now());
        post_webhook(&self.http, &self.webhook_url, &body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn embed_carries_job_and_hash() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let body = payload(&Address::new("0xJOB"), "0xhash", at);
        let embed = &body["embeds"][0];

        assert_eq!(embed["title"], "🔔 MakerDAO Job Worked");
        assert_eq!(embed["color"], 5_814_783);
        assert_eq!(embed["fields"][0]["name"], "Job Address");
        assert_eq!(embed["fields"][0]["value"], "0xjob");
        assert_eq!(embed["fields"][1]["value"], "0xhash");
        assert_eq!(embed["fields"][1]["inline"], true);
        assert_eq!(embed["timestamp"], "2024-05-01T12:00:00.000Z");
    }
}
