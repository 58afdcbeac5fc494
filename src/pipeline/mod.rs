//! Consumer side of the notification pipeline.
//!
//! Every record read from the primary topic flows through:
//! 1. `codec::decode_raw()`: bytes to a JSON object
//! 2. `codec::validate_structure()`: required envelope fields present
//! 3. `codec::decode_typed()`: typed `Envelope`
//! 4. `DispatchRegistry::dispatch()`: first matching handler
//!
//! A failure at any step sends the original record to the dead-letter
//! topic once. Unrecognized types are dropped.

pub mod consumer;
pub mod dead_letter;
pub mod types;

pub use consumer::ConsumerLoop;
pub use dead_letter::{DeadLetterForwarder, ERROR_TIMESTAMP_HEADER};
pub use types::{ConsumerOptions, ConsumerState, ConsumerSummary, FailureStage, ProcessOutcome};
