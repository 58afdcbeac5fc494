//! Shared types for the consumer pipeline.

use std::time::Duration;

use crate::error::{CodecError, PipelineError};

/// Lifecycle of a [`ConsumerLoop`](super::ConsumerLoop), published on a watch channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerState {
    Running,
    Stopping,
    Stopped,
}

/// Tunables for the consumer loop.
#[derive(Debug, Clone)]
pub struct ConsumerOptions {
    /// Upper bound on a single dispatch. `None` lets handlers run to completion.
    pub handler_timeout: Option<Duration>,
    /// Pause after a failed read before trying again.
    pub read_error_backoff: Duration,
}

impl Default for ConsumerOptions {
    fn default() -> Self {
        Self {
            handler_timeout: None,
            read_error_backoff: Duration::from_millis(250),
        }
    }
}

/// Stage at which a record was given up on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    /// Value was empty or not a JSON object.
    Malformed,
    /// One or more required envelope fields were absent.
    Structure,
    /// Fields were present but had the wrong shape.
    TypedDecode,
    /// The matching handler returned an error.
    Handler,
}

impl FailureStage {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Malformed => "malformed",
            Self::Structure => "structure",
            Self::TypedDecode => "typed_decode",
            Self::Handler => "handler",
        }
    }
}

impl PipelineError {
    /// Which processing stage produced this error.
    pub fn stage(&self) -> FailureStage {
        match self {
            Self::EmptyValue | Self::Codec(CodecError::Malformed(_)) => FailureStage::Malformed,
            Self::Codec(CodecError::MissingFields(_)) => FailureStage::Structure,
            Self::Codec(_) => FailureStage::TypedDecode,
            Self::Handler(_) => FailureStage::Handler,
        }
    }
}

/// What happened to one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    Handled,
    /// No handler for the type; dropped without dead-lettering.
    Unrecognized,
    /// Processing failed and the record was forwarded to the dead-letter topic.
    DeadLettered(FailureStage),
    /// Processing failed and the dead-letter write failed too. The record is lost.
    DeadLetterFailed(FailureStage),
}

impl ProcessOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Handled => "handled",
            Self::Unrecognized => "unrecognized",
            Self::DeadLettered(_) => "dead_lettered",
            Self::DeadLetterFailed(_) => "dead_letter_failed",
        }
    }
}

/// Counters returned when the consumer loop exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerSummary {
    pub received: u64,
    pub handled: u64,
    pub unrecognized: u64,
    pub dead_lettered: u64,
    pub dead_letter_failures: u64,
    pub read_errors: u64,
}

impl ConsumerSummary {
    pub(crate) fn record(&mut self, outcome: ProcessOutcome) {
        self.received += 1;
        match outcome {
            ProcessOutcome::Handled => self.handled += 1,
            ProcessOutcome::Unrecognized => self.unrecognized += 1,
            ProcessOutcome::DeadLettered(_) => self.dead_lettered += 1,
            ProcessOutcome::DeadLetterFailed(_) => self.dead_letter_failures += 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{HandlerError, NotifyError};

    #[test]
    fn pipeline_error_stages() {
        let malformed = serde_json::from_slice::<serde_json::Value>(b"{").unwrap_err();
        assert_eq!(PipelineError::EmptyValue.stage(), FailureStage::Malformed);
        assert_eq!(
            PipelineError::Codec(CodecError::Malformed(malformed)).stage(),
            FailureStage::Malformed
        );
        assert_eq!(
            PipelineError::Codec(CodecError::MissingFields(vec!["id"])).stage(),
            FailureStage::Structure
        );
        assert_eq!(
            PipelineError::Codec(CodecError::InvalidField {
                field: "id",
                reason: "must not be empty".into(),
            })
            .stage(),
            FailureStage::TypedDecode
        );
        assert_eq!(
            PipelineError::Handler(HandlerError::Delivery(NotifyError::Http("x".into()))).stage(),
            FailureStage::Handler
        );
    }

    #[test]
    fn summary_counts_each_outcome() {
        let mut summary = ConsumerSummary::default();
        summary.record(ProcessOutcome::Handled);
        summary.record(ProcessOutcome::Unrecognized);
        summary.record(ProcessOutcome::DeadLettered(FailureStage::TypedDecode));
        summary.record(ProcessOutcome::DeadLetterFailed(FailureStage::Handler));

        assert_eq!(
            summary,
            ConsumerSummary {
                received: 4,
                handled: 1,
                unrecognized: 1,
                dead_lettered: 1,
                dead_letter_failures: 1,
                read_errors: 0,
            }
        );
    }

    #[test]
    fn outcome_labels_ignore_stage() {
        assert_eq!(ProcessOutcome::Handled.label(), "handled");
        assert_eq!(
            ProcessOutcome::DeadLettered(FailureStage::Structure).label(),
            ProcessOutcome::DeadLettered(FailureStage::Handler).label()
        );
        assert_eq!(
            ProcessOutcome::DeadLetterFailed(FailureStage::Malformed).label(),
            "dead_letter_failed"
        );
    }

    #[test]
    fn default_options_have_no_handler_bound() {
        let options = ConsumerOptions::default();
        assert!(options.handler_timeout.is_none());
        assert_eq!(options.read_error_backoff, Duration::from_millis(250));
    }
}
