//! Wire encoding for envelopes.
//!
//! Decoding runs in three phases, each with its own error:
//! 1. `decode_raw()`: bytes must be a JSON object (`Malformed`)
//! 2. `validate_structure()`: all four keys present, any value type
//! 3. `decode_typed()`: field types and invariants (`TypedDecode` / `InvalidField`)
//!
//! An envelope whose `timestamp` is a string therefore passes phase 2
//! and only fails in phase 3.

use serde_json::{Map, Value};

use crate::envelope::model::Envelope;
use crate::error::CodecError;

/// Keys every serialized envelope must carry.
pub const REQUIRED_FIELDS: [&str; 4] = ["id", "type", "payload", "timestamp"];

/// Serialize an envelope to its JSON wire form.
///
/// Output is deterministic: struct fields are emitted in declaration
/// order and payload objects with sorted keys.
pub fn encode(envelope: &Envelope) -> Result<Vec<u8>, CodecError> {
    serde_json::to_vec(envelope).map_err(CodecError::Encode)
}

/// Phase 1: parse bytes into a generic JSON object.
pub fn decode_raw(bytes: &[u8]) -> Result<Map<String, Value>, CodecError> {
    serde_json::from_slice(bytes).map_err(CodecError::Malformed)
}

/// Phase 2: true only if every required key is present.
pub fn validate_structure(raw: &Map<String, Value>) -> bool {
    REQUIRED_FIELDS.iter().all(|field| raw.contains_key(*field))
}

/// Required keys absent from `raw`, in canonical order.
pub fn missing_fields(raw: &Map<String, Value>) -> Vec<&'static str> {
    REQUIRED_FIELDS
        .iter()
        .copied()
        .filter(|field| !raw.contains_key(*field))
        .collect()
}

/// Phase 3: typed decode of a structurally valid object.
pub fn decode_typed(raw: Map<String, Value>) -> Result<Envelope, CodecError> {
    let envelope: Envelope =
        serde_json::from_value(Value::Object(raw)).map_err(CodecError::TypedDecode)?;
    envelope.check()?;
    Ok(envelope)
}

/// Run all three phases.
pub fn decode(bytes: &[u8]) -> Result<Envelope, CodecError> {
    let raw = decode_raw(bytes)?;
    if !validate_structure(&raw) {
        return Err(CodecError::MissingFields(missing_fields(&raw)));
    }
    decode_typed(raw)
}
