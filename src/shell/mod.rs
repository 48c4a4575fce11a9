//! Host-application integration points.
//!
//! The session core never talks to a UI directly. Navigation, toasts, and
//! translations are injected behind these traits; the in-memory
//! implementations double as test doubles and headless defaults.

pub mod locale;
pub mod nav;
pub mod notify;

// Re-exports
pub use locale::{Localizer, Message, StaticLocalizer, msg};
pub use nav::{MemoryNavigator, Navigator};
pub use notify::{LogNotifier, MemoryNotifier, Notifier, ToastLevel};
