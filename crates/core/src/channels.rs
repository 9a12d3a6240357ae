//! Well-known delivery channel names and the typed [`Channel`] enum.
//!
//! Notifications store their requested channels as plain strings (they come
//! from rule templates), so the string constants must match the values
//! written to `notifications.channels` and `notification_deliveries.channel`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// In-app notification. The persisted row itself is the delivery.
pub const CHANNEL_IN_APP: &str = "in_app";

/// Email notification delivered via SMTP.
pub const CHANNEL_EMAIL: &str = "email";

/// Mobile push notification delivered through a push gateway.
pub const CHANNEL_PUSH: &str = "push";

/// Text message delivered through an SMS gateway.
pub const CHANNEL_SMS: &str = "sms";

/// Team chat message delivered to an incoming-webhook endpoint.
pub const CHANNEL_CHAT: &str = "chat";

/// A delivery medium.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    InApp,
    Email,
    Push,
    Sms,
    Chat,
}

impl Channel {
    pub const ALL: [Channel; 5] = [
        Channel::InApp,
        Channel::Email,
        Channel::Push,
        Channel::Sms,
        Channel::Chat,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Channel::InApp => CHANNEL_IN_APP,
            Channel::Email => CHANNEL_EMAIL,
            Channel::Push => CHANNEL_PUSH,
            Channel::Sms => CHANNEL_SMS,
            Channel::Chat => CHANNEL_CHAT,
        }
    }

    /// Parse a channel name. Unknown names return `None`.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == name)
    }

    /// Whether delivery leaves the platform (and is therefore subject to
    /// user preferences and quiet hours).
    pub fn is_external(self) -> bool {
        !matches!(self, Channel::InApp)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalise a requested channel list into an ordered set.
///
/// Names are trimmed, empty entries dropped, and later duplicates removed so
/// the first occurrence keeps its position. Unknown names are kept; the
/// delivery orchestrator reports them per channel.
pub fn ordered_channel_set<I, S>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for name in names {
        let name = name.as_ref().trim();
        if name.is_empty() || out.iter().any(|existing| existing == name) {
            continue;
        }
        out.push(name.to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_round_trips_every_channel() {
        for channel in Channel::ALL {
            assert_eq!(Channel::parse(channel.as_str()), Some(channel));
        }
    }

    #[test]
    fn parse_rejects_unknown_and_is_case_sensitive() {
        assert_eq!(Channel::parse("fax"), None);
        assert_eq!(Channel::parse("EMAIL"), None);
    }

    #[test]
    fn only_in_app_is_internal() {
        assert!(!Channel::InApp.is_external());
        assert!(Channel::Email.is_external());
        assert!(Channel::Chat.is_external());
    }

    #[test]
    fn ordered_channel_set_keeps_first_occurrence() {
        let set = ordered_channel_set(["email", " push ", "", "email", "in_app", "push"]);
        assert_eq!(set, vec!["email", "push", "in_app"]);
    }
}
