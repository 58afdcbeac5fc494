//! Dispatch registry: predicate/handler pairs keyed by message type.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::envelope::Envelope;
use crate::error::HandlerError;

/// Handles every envelope whose type it `matches`.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Handler name for logging.
    fn name(&self) -> &str;

    /// Whether this handler owns envelopes tagged `kind`.
    fn matches(&self, kind: &str) -> bool;

    /// Process one envelope. An error marks the message as failed.
    async fn handle(&self, envelope: &Envelope) -> Result<(), HandlerError>;
}

/// Result of dispatching one envelope.
#[derive(Debug)]
pub enum DispatchOutcome {
    /// A handler accepted the envelope and completed without error.
    Handled,
    /// No handler is registered for the type. Not a failure.
    Unrecognized,
    /// The matching handler returned an error.
    HandlerFailed(HandlerError),
}

/// Ordered set of handlers. The first handler that matches wins.
#[derive(Default)]
pub struct DispatchRegistry {
    handlers: Vec<Arc<dyn MessageHandler>>,
}

impl DispatchRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler after the existing ones.
    pub fn register(&mut self, handler: Arc<dyn MessageHandler>) {
        debug!(handler = handler.name(), "Registered message handler");
        self.handlers.push(handler);
    }

    /// Builder form of [`register`](Self::register).
    pub fn with_handler(mut self, handler: Arc<dyn MessageHandler>) -> Self {
        self.register(handler);
        self
    }

    /// Names of registered handlers, in match order.
    pub fn handler_names(&self) -> Vec<&str> {
        self.handlers.iter().map(|h| h.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Route an envelope to the first handler that matches its type.
    pub async fn dispatch(&self, envelope: &Envelope) -> DispatchOutcome {
        let Some(handler) = self.handlers.iter().find(|h| h.matches(envelope.kind())) else {
            warn!(id = %envelope.id(), kind = %envelope.kind(), "Unknown message type");
            return DispatchOutcome::Unrecognized;
        };

        debug!(id = %envelope.id(), handler = handler.name(), "Dispatching message");
        match handler.handle(envelope).await {
            Ok(()) => DispatchOutcome::Handled,
            Err(e) => DispatchOutcome::HandlerFailed(e),
        }
    }
}
