//! Concrete [`NotificationSink`](job_watch_domain::ports::NotificationSink)
//! implementations.

mod console;
mod discord;
mod slack;

pub use console::ConsoleNotifier;
pub use discord::DiscordNotifier;
pub use slack::SlackNotifier;

use job_watch_domain::ports::DeliveryError;

pub(crate) const NOTIFICATION_TITLE: &str = "MakerDAO Job Worked";

/// POSTs a JSON payload to a webhook, mapping non-2xx to a rejection.
pub(crate) async fn post_webhook(
    http: &reqwest::Client,
    url: &str,
    payload: &serde_json::Value,
) -> Result<(), DeliveryError> {
    let response = http
        .post(url)
        .json(payload)
        .send()
        .await
        .map_err(|err| DeliveryError::Transport(err.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(DeliveryError::Rejected {
            status: status.as_u16(),
        });
    }
    Ok(())
}
