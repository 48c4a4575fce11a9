//! Toast notification hook into the host application's UI.

use std::sync::{Arc, Mutex};

/// Severity of a user-facing toast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
    Success,
    Warning,
    Error,
}

impl std::fmt::Display for ToastLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Dispatches user-facing notifications. Implementations must not block.
pub trait Notifier: Send + Sync {
    fn notify(&self, level: ToastLevel, message: &str);

    fn success(&self, message: &str) {
        self.notify(ToastLevel::Success, message);
    }

    fn warning(&self, message: &str) {
        self.notify(ToastLevel::Warning, message);
    }

    fn error(&self, message: &str) {
        self.notify(ToastLevel::Error, message);
    }
}

/// Notifier that only writes to the log. The default for headless use.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, level: ToastLevel, message: &str) {
        match level {
            ToastLevel::Success => tracing::info!(message, "toast"),
            ToastLevel::Warning => tracing::warn!(message, "toast"),
            ToastLevel::Error => tracing::error!(message, "toast"),
        }
    }
}

/// Notifier that records every toast. Useful for tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryNotifier {
    toasts: Arc<Mutex<Vec<(ToastLevel, String)>>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// All toasts in dispatch order.
    pub fn toasts(&self) -> Vec<(ToastLevel, String)> {
        self.toasts.lock().expect("lock poisoned").clone()
    }

    /// Toasts of one level only.
    pub fn messages_at(&self, level: ToastLevel) -> Vec<String> {
        self.toasts
            .lock()
            .expect("lock poisoned")
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m.clone())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.toasts.lock().expect("lock poisoned").is_empty()
    }
}

impl Notifier for MemoryNotifier {
    fn notify(&self, level: ToastLevel, message: &str) {
        self.toasts
            .lock()
            .expect("lock poisoned")
            .push((level, message.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_notifier_records_levels() {
        let notifier = MemoryNotifier::new();
        assert!(notifier.is_empty());

        notifier.success("saved");
        notifier.warning("expiring");
        notifier.error("failed");

        assert_eq!(notifier.toasts().len(), 3);
        assert_eq!(notifier.messages_at(ToastLevel::Warning), vec!["expiring"]);
        assert_eq!(notifier.messages_at(ToastLevel::Error), vec!["failed"]);
    }

    #[test]
    fn test_toast_level_display() {
        assert_eq!(ToastLevel::Success.to_string(), "success");
        assert_eq!(ToastLevel::Warning.to_string(), "warning");
        assert_eq!(ToastLevel::Error.to_string(), "error");
    }
}
