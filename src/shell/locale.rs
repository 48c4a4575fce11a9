//! Translation lookup for user-facing session messages.

use async_trait::async_trait;
use std::collections::HashMap;

/// A user-facing message: catalog key plus the hardcoded English fallback
/// used when the catalog has not loaded or lacks the key.
#[derive(Debug, Clone, Copy)]
pub struct Message {
    pub key: &'static str,
    pub fallback: &'static str,
}

/// Messages the session lifecycle can surface.
pub mod msg {
    use super::Message;

    pub const SESSION_EXPIRED: Message = Message {
        key: "auth.session-expired",
        fallback: "Your session has expired. Please log in again.",
    };

    pub const REFRESH_FAILED: Message = Message {
        key: "auth.refresh-failed",
        fallback: "Could not refresh your session. Please try again.",
    };

    pub const LOGOUT_SUCCESS: Message = Message {
        key: "auth.logout-success",
        fallback: "You have been signed out.",
    };
}

/// Access to the host application's translation catalog.
///
/// The session manager waits (bounded) for [`ready`](Localizer::ready) during
/// startup so early toasts come out translated, then proceeds regardless.
#[async_trait]
pub trait Localizer: Send + Sync {
    /// Resolves once the active language catalog has loaded.
    async fn ready(&self);

    /// Translated text for a catalog key, if present.
    fn message(&self, key: &str) -> Option<String>;

    /// Resolve a message, falling back to its hardcoded English text.
    fn resolve(&self, message: &Message) -> String {
        self.message(message.key)
            .unwrap_or_else(|| message.fallback.to_string())
    }
}

/// Localizer over a fixed in-memory catalog; ready immediately.
#[derive(Debug, Clone, Default)]
pub struct StaticLocalizer {
    catalog: HashMap<String, String>,
}

impl StaticLocalizer {
    /// Empty catalog: every lookup falls back.
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog preloaded with the English texts for the session messages.
    pub fn english() -> Self {
        Self::from_pairs(&[
            (msg::SESSION_EXPIRED.key, msg::SESSION_EXPIRED.fallback),
            (msg::REFRESH_FAILED.key, msg::REFRESH_FAILED.fallback),
            (msg::LOGOUT_SUCCESS.key, msg::LOGOUT_SUCCESS.fallback),
        ])
    }

    pub fn from_pairs(pairs: &[(&str, &str)]) -> Self {
        Self {
            catalog: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

#[async_trait]
impl Localizer for StaticLocalizer {
    async fn ready(&self) {}

    fn message(&self, key: &str) -> Option<String> {
        self.catalog.get(key).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_localizer_is_ready_immediately() {
        let localizer = StaticLocalizer::english();
        localizer.ready().await;
        assert_eq!(
            localizer.message(msg::LOGOUT_SUCCESS.key).as_deref(),
            Some(msg::LOGOUT_SUCCESS.fallback)
        );
    }

    #[test]
    fn test_resolve_prefers_catalog() {
        let localizer =
            StaticLocalizer::from_pairs(&[("auth.session-expired", "Sitzung abgelaufen")]);
        assert_eq!(
            localizer.resolve(&msg::SESSION_EXPIRED),
            "Sitzung abgelaufen"
        );
    }

    #[test]
    fn test_resolve_falls_back_when_missing() {
        let localizer = StaticLocalizer::new();
        assert_eq!(
            localizer.resolve(&msg::REFRESH_FAILED),
            msg::REFRESH_FAILED.fallback
        );
    }
}
