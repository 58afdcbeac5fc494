//! Dispatch: routes decoded envelopes to the handler for their type.

pub mod notification;
pub mod registry;

pub use notification::NotificationHandler;
pub use registry::{DispatchOutcome, DispatchRegistry, MessageHandler};
