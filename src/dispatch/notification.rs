//! Handler for `notification` envelopes.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::dispatch::registry::MessageHandler;
use crate::envelope::{Envelope, MessageKind, NotificationPayload};
use crate::error::HandlerError;
use crate::notify::Notifier;

/// Decodes a [`NotificationPayload`] and hands it to a [`Notifier`].
pub struct NotificationHandler {
    notifier: Arc<dyn Notifier>,
}

impl NotificationHandler {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }
}

#[async_trait]
impl MessageHandler for NotificationHandler {
    fn name(&self) -> &str {
        "notification"
    }

    fn matches(&self, kind: &str) -> bool {
        MessageKind::from_type(kind) == Some(MessageKind::Notification)
    }

    async fn handle(&self, envelope: &Envelope) -> Result<(), HandlerError> {
        let notification = NotificationPayload::from_envelope(envelope).map_err(|source| {
            HandlerError::PayloadShape {
                kind: MessageKind::Notification.as_str(),
                source,
            }
        })?;

        info!(
            id = %envelope.id(),
            chat_id = notification.chat_id,
            message_id = notification.message_id.as_deref().unwrap_or(""),
            notifier = self.notifier.name(),
            "Processing notification"
        );

        self.notifier
            .deliver(notification.chat_id, &notification.text)
            .await?;
        Ok(())
    }
}
