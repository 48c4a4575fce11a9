//! Navigation hook into the host application's router.

use std::sync::{Arc, Mutex};

/// Dispatches in-app navigation. Implementations must not block; the session
/// manager calls this from async context on logout and redirect paths.
pub trait Navigator: Send + Sync {
    fn navigate(&self, path: &str);
}

/// Navigator that records every visit. Useful for tests and headless runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryNavigator {
    visits: Arc<Mutex<Vec<String>>>,
}

impl MemoryNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recent navigation target, if any.
    pub fn current(&self) -> Option<String> {
        self.visits.lock().expect("lock poisoned").last().cloned()
    }

    /// All navigation targets in order.
    pub fn history(&self) -> Vec<String> {
        self.visits.lock().expect("lock poisoned").clone()
    }

    pub fn clear(&self) {
        self.visits.lock().expect("lock poisoned").clear();
    }
}

impl Navigator for MemoryNavigator {
    fn navigate(&self, path: &str) {
        tracing::debug!(path, "navigate");
        self.visits
            .lock()
            .expect("lock poisoned")
            .push(path.to_string());
    }
}
