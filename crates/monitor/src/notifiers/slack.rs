use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use job_watch_domain::ports::{DeliveryError, NotificationSink};
use job_watch_domain::Address;
use serde_json::{json, Value};

use super::{post_webhook, NOTIFICATION_TITLE};

/// Posts a Block Kit message to a Slack incoming webhook.
#[derive(Debug, Clone)]
pub struct SlackNotifier {
    http: reqwest::Client,
    webhook_url: String,
}

impl SlackNotifier {
    pub fn new(http: reqwest::Client, webhook_url: impl Into<String>) -> Self {
        Self {
            http,
            webhook_url: webhook_url.into(),
        }
    }
}

pub(crate) fn payload(job: &Address, tx_hash: &str, at: DateTime<Utc>) -> Value {
    json!({
        "blocks": [
            {
                "type": "header",
                "text": { "type": "plain_text", "text": format!("🔔 {NOTIFICATION_TITLE}") }
            },
            {
                "type": "section",
                "fields": [
                    { "type": "mrkdwn", "text": format!("*Job Address*\n{job}") },
                    { "type": "mrkdwn", "text": format!("*Tx Hash*\n{tx_hash}") },
                ]
            },
            {
                "type": "context",
                "elements": [
                    {
                        "type": "mrkdwn",
                        "text": format!("🕐 {}", at.to_rfc3339_opts(SecondsFormat::Millis, true))
                    }
                ]
            }
        ]
    })
}

#[async_trait]
impl NotificationSink for SlackNotifier {
    fn name(&self) -> &str {
        "slack"
    }

    async fn notify(&self, job: &Address, tx_hash: &str) -> Result<(), DeliveryError> {
        let body = payload(job, tx_hash, Utc::now());
        post_webhook(&self.http, &self.webhook_url, &body).await
    }
}
