//! Console notifier: prints notifications instead of sending them.

use async_trait::async_trait;
use tracing::info;

use crate::error::NotifyError;
use crate::notify::Notifier;

/// Writes each notification to stdout. Useful for local runs without a bot.
pub struct ConsoleNotifier;

impl ConsoleNotifier {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ConsoleNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Notifier for ConsoleNotifier {
    fn name(&self) -> &str {
        "console"
    }

    async fn deliver(&self, recipient: i64, text: &str) -> Result<(), NotifyError> {
        info!(chat_id = recipient, text = %text, "Sending notification");
        println!("📧 Notification to chat {}: {}", recipient, text);
        Ok(())
    }
}
