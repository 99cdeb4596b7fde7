use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use job_watch_domain::ports::{DeliveryError, NotificationSink};
use job_watch_domain::Address;
use tracing::info;

/// Writes each detected job execution to the log stream.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleNotifier;

#[async_trait]
impl NotificationSink for ConsoleNotifier {
    fn name(&self) -> &str {
        "console"
    }

    async fn notify(&self, job: &Address, tx_hash: &str) -> Result<(), DeliveryError> {
        info!(
            job = %job,
            tx_hash,
            timestamp = %Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            "job worked"
        );
        Ok(())
    }
}
