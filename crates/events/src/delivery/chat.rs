//! Team chat delivery to an incoming-webhook URL, with retry.
//!
//! [`ChatTransport`] posts a short text message. Failed attempts are retried
//! with exponential backoff; the orchestrator's channel timeout still bounds
//! the whole send.

use std::time::Duration;

use async_trait::async_trait;
use herald_core::channels::Channel;
use herald_core::event::Severity;
use herald_core::notification::Notification;
use herald_core::recipient::Recipient;

use super::{ChannelTransport, DeliveryError, DeliveryResult};

/// Retry delays in milliseconds (exponential backoff).
const RETRY_DELAYS_MS: [u64; 3] = [250, 500, 1000];

/// HTTP request timeout for a single attempt.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Text posted to the chat channel.
pub fn chat_text(notification: &Notification) -> String {
    let marker = match notification.severity {
        Severity::Critical => ":rotating_light: ",
        Severity::Warning => ":warning: ",
        _ => "",
    };
    let mut text = format!("{marker}*{}*", notification.title);
    if !notification.body.is_empty() {
        text.push('\n');
        text.push_str(&notification.body);
    }
    if let Some(url) = &notification.action_url {
        text.push_str(&format!("\n<{url}|{}>", notification.action_label.as_deref().unwrap_or("Open")));
    }
    text
}

/// Posts notifications to a chat incoming webhook.
pub struct ChatTransport {
    url: String,
    client: reqwest::Client,
}

impl ChatTransport {
    pub fn new(url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self { url, client }
    }

    /// `CHAT_WEBHOOK_URL`, if set and non-empty.
    pub fn url_from_env() -> Option<String> {
        std::env::var("CHAT_WEBHOOK_URL").ok().filter(|u| !u.is_empty())
    }

    async fn try_send(&self, payload: &serde_json::Value) -> DeliveryResult {
        let response = self.client.post(&self.url).json(payload).send().await?;
        if !response.status().is_success() {
            return Err(DeliveryError::HttpStatus(response.status().as_u16()));
        }
        Ok(())
    }
}

#[async_trait]
impl ChannelTransport for ChatTransport {
    fn channel(&self) -> Channel {
        Channel::Chat
    }

    /// Chat messages go to a shared channel, so the recipient only appears
    /// in logs.
    async fn send(&self, recipient: &Recipient, notification: &Notification) -> DeliveryResult {
        let payload = serde_json::json!({ "text": chat_text(notification) });

        for (attempt, delay_ms) in RETRY_DELAYS_MS.iter().enumerate() {
            match self.try_send(&payload).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        user_id = recipient.user_id,
                        error = %e,
                        "Chat delivery attempt failed, retrying"
                    );
                    tokio::time::sleep(Duration::from_millis(*delay_ms)).await;
                }
            }
        }

        // Final attempt after the last backoff.
        self.try_send(&payload).await.inspect_err(|e| {
            tracing::error!(user_id = recipient.user_id, error = %e, "Chat delivery failed after all retries");
        })
    }
}
