//! Message envelope: the unit of transport on the log.
//!
//! `model` holds the envelope and the typed payload shapes, `codec` the
//! wire encoding and the two-phase validation used by the consumer.

pub mod codec;
pub mod model;

pub use codec::{decode, decode_raw, decode_typed, encode, missing_fields, validate_structure};
pub use model::{CreationRequest, CreationResult, Envelope, MessageKind, NotificationPayload};
