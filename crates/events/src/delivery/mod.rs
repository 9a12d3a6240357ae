//! Channel transports and the delivery orchestrator.
//!
//! A transport implements [`ChannelTransport`] for one external channel.
//! [`DeliveryOrchestrator`] decides which channels to attempt for a
//! notification, runs the attempts in parallel with a per-call timeout, and
//! folds the results into a [`DeliveryReport`](herald_core::delivery::DeliveryReport).

pub mod chat;
pub mod email;
pub mod gateway;
pub mod orchestrator;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use herald_core::channels::Channel;
use herald_core::notification::Notification;
use herald_core::recipient::Recipient;
use herald_core::types::DbId;

pub use orchestrator::DeliveryOrchestrator;

/// Why a single channel send failed.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// The user has no address for this channel.
    #[error("User {user_id} has no {channel} address")]
    MissingAddress { channel: Channel, user_id: DbId },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Gateway returned HTTP {0}")]
    HttpStatus(u16),

    #[error(transparent)]
    Email(#[from] email::EmailError),
}

pub type DeliveryResult = Result<(), DeliveryError>;

/// Sends a rendered notification to one recipient over one channel.
///
/// Implementations must be safe to call concurrently. The orchestrator
/// bounds every call with its own timeout.
#[async_trait]
pub trait ChannelTransport: Send + Sync {
    fn channel(&self) -> Channel;

    async fn send(&self, recipient: &Recipient, notification: &Notification) -> DeliveryResult;
}

/// The configured transport for each external channel.
#[derive(Clone, Default)]
pub struct Transports {
    by_channel: HashMap<Channel, Arc<dyn ChannelTransport>>,
}

impl Transports {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `transport` for its channel, replacing any previous one.
    pub fn with(mut self, transport: Arc<dyn ChannelTransport>) -> Self {
        self.by_channel.insert(transport.channel(), transport);
        self
    }

    pub fn get(&self, channel: Channel) -> Option<Arc<dyn ChannelTransport>> {
        self.by_channel.get(&channel).cloned()
    }

    pub fn channels(&self) -> Vec<Channel> {
        let mut channels: Vec<_> = self.by_channel.keys().copied().collect();
        channels.sort_by_key(|c| c.as_str());
        channels
    }

    /// Build every transport whose environment variables are set.
    ///
    /// Channels left unconfigured are skipped at delivery time.
    pub fn from_env() -> Self {
        let mut transports = Self::new();
        if let Some(config) = email::EmailConfig::from_env() {
            transports = transports.with(Arc::new(email::EmailTransport::new(config)));
        }
        if let Some(config) = gateway::GatewayConfig::from_env(Channel::Push) {
            transports = transports.with(Arc::new(gateway::GatewayTransport::new(config)));
        }
        if let Some(config) = gateway::GatewayConfig::from_env(Channel::Sms) {
            transports = transports.with(Arc::new(gateway::GatewayTransport::new(config)));
        }
        if let Some(url) = chat::ChatTransport::url_from_env() {
            transports = transports.with(Arc::new(chat::ChatTransport::new(url)));
        }
        tracing::info!(
            channels = ?transports.channels(),
            "Delivery transports configured"
        );
        transports
    }
}
