//! Push and SMS delivery through HTTP gateways.
//!
//! Both channels POST a small JSON document to a provider gateway. Push
//! addresses the user's device token, SMS the user's phone number.

use std::time::Duration;

use async_trait::async_trait;
use herald_core::channels::Channel;
use herald_core::notification::Notification;
use herald_core::recipient::Recipient;
use serde_json::json;

use super::{ChannelTransport, DeliveryError, DeliveryResult};

/// HTTP request timeout for a single gateway call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// SMS bodies longer than this are truncated.
const SMS_MAX_CHARS: usize = 480;

/// Where and how to reach the gateway for one channel.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub channel: Channel,
    pub url: String,
    /// Sent as a bearer token when present.
    pub api_key: Option<String>,
}

impl GatewayConfig {
    /// Load the gateway for `channel` from the environment.
    ///
    /// | Channel | URL variable        | Key variable                          |
    /// |---------|---------------------|---------------------------------------|
    /// | push    | `PUSH_GATEWAY_URL`  | `PUSH_GATEWAY_KEY`, else `GATEWAY_API_KEY` |
    /// | sms     | `SMS_GATEWAY_URL`   | `SMS_GATEWAY_KEY`, else `GATEWAY_API_KEY`  |
    ///
    /// Returns `None` for other channels or when the URL is unset.
    pub fn from_env(channel: Channel) -> Option<Self> {
        let (url_var, key_var) = match channel {
            Channel::Push => ("PUSH_GATEWAY_URL", "PUSH_GATEWAY_KEY"),
            Channel::Sms => ("SMS_GATEWAY_URL", "SMS_GATEWAY_KEY"),
            _ => return None,
        };
        let url = std::env::var(url_var).ok().filter(|u| !u.is_empty())?;
        let api_key = std::env::var(key_var)
            .or_else(|_| std::env::var("GATEWAY_API_KEY"))
            .ok()
            .filter(|k| !k.is_empty());
        Some(Self {
            channel,
            url,
            api_key,
        })
    }
}

/// Request body for one gateway call.
///
/// Fails with [`DeliveryError::MissingAddress`] when the recipient has no
/// token or phone for the configured channel.
pub fn gateway_payload(
    channel: Channel,
    recipient: &Recipient,
    notification: &Notification,
) -> Result<serde_json::Value, DeliveryError> {
    let missing = || DeliveryError::MissingAddress {
        channel,
        user_id: recipient.user_id,
    };
    let address = match channel {
        Channel::Push => recipient.device_token.as_deref(),
        Channel::Sms => recipient.phone.as_deref(),
        _ => None,
    }
    .filter(|a| !a.is_empty())
    .ok_or_else(missing)?;

    Ok(match channel {
        Channel::Sms => {
            let text = if notification.body.is_empty() {
                notification.title.clone()
            } else {
                format!("{}: {}", notification.title, notification.body)
            };
            json!({
                "to": address,
                "message": text.chars().take(SMS_MAX_CHARS).collect::<String>(),
            })
        }
        _ => json!({
            "token": address,
            "title": notification.title,
            "body": notification.body,
            "data": {
                "notification_id": notification.id,
                "severity": notification.severity,
                "action_url": notification.action_url,
            },
        }),
    })
}

/// Sends push or SMS notifications through a JSON-over-HTTP gateway.
pub struct GatewayTransport {
    config: GatewayConfig,
    client: reqwest::Client,
}

impl GatewayTransport {
    pub fn new(config: GatewayConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self { config, client }
    }
}

#[async_trait]
impl ChannelTransport for GatewayTransport {
    fn channel(&self) -> Channel {
        self.config.channel
    }

    async fn send(&self, recipient: &Recipient, notification: &Notification) -> DeliveryResult {
        let payload = gateway_payload(self.config.channel, recipient, notification)?;

        let mut request = self.client.post(&self.config.url).json(&payload);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }
        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(DeliveryError::HttpStatus(response.status().as_u16()));
        }

        tracing::debug!(
            channel = %self.config.channel,
            user_id = recipient.user_id,
            notification_id = notification.id,
            "Gateway accepted notification"
        );
        Ok(())
    }
}
