//! Notification sinks: where recognized notifications are delivered.

pub mod console;
pub mod telegram;

use async_trait::async_trait;

use crate::error::NotifyError;

pub use console::ConsoleNotifier;
pub use telegram::TelegramNotifier;

/// Delivers a text to a recipient. Implementations must be cheap to share.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Sink name for logging (e.g. "telegram").
    fn name(&self) -> &str;

    /// Deliver `text` to `recipient`. One attempt, no internal retry.
    async fn deliver(&self, recipient: i64, text: &str) -> Result<(), NotifyError>;
}
