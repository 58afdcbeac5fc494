//! Consumer loop over the primary topic. Records that cannot be
//! processed go to the dead-letter topic.

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::dispatch::{DispatchOutcome, DispatchRegistry};
use crate::envelope::codec;
use crate::error::{CodecError, HandlerError, LogError, PipelineError};
use crate::log::{LogReader, Record};
use crate::pipeline::dead_letter::DeadLetterForwarder;
use crate::pipeline::types::{ConsumerOptions, ConsumerState, ConsumerSummary, ProcessOutcome};

/// Sequential reader/dispatcher for one consumer group.
///
/// Records are processed one at a time in read order. Cancellation is
/// only observed between records and while blocked in a read, so a
/// record that has been read is always carried through to an outcome.
pub struct ConsumerLoop {
    reader: Box<dyn LogReader>,
    registry: DispatchRegistry,
    dead_letter: DeadLetterForwarder,
    options: ConsumerOptions,
    state: watch::Sender<ConsumerState>,
    summary: ConsumerSummary,
}

impl ConsumerLoop {
    pub fn new(
        reader: Box<dyn LogReader>,
        registry: DispatchRegistry,
        dead_letter: DeadLetterForwarder,
        options: ConsumerOptions,
    ) -> Self {
        let (state, _) = watch::channel(ConsumerState::Running);
        Self {
            reader,
            registry,
            dead_letter,
            options,
            state,
            summary: ConsumerSummary::default(),
        }
    }

    /// Subscribe to state transitions.
    pub fn state(&self) -> watch::Receiver<ConsumerState> {
        self.state.subscribe()
    }

    /// Counters accumulated so far.
    pub fn summary(&self) -> ConsumerSummary {
        self.summary
    }

    /// Run until `cancel` fires, then release the reader and dead-letter writer.
    #[instrument(
        name = "consumer",
        skip_all,
        fields(topic = %self.reader.topic(), dead_letter = %self.dead_letter.topic())
    )]
    pub async fn run(mut self, cancel: CancellationToken) -> ConsumerSummary {
        self.state.send_replace(ConsumerState::Running);
        if self.registry.is_empty() {
            warn!("No message handlers registered, every message will be dropped");
        }
        info!(handlers = ?self.registry.handler_names(), "Consumer started");

        while !cancel.is_cancelled() {
            let record = match self.reader.read(&cancel).await {
                Ok(record) => record,
                Err(LogError::Cancelled) => break,
                Err(e) => {
                    self.summary.read_errors += 1;
                    error!(error = %e, "Error reading message");
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(self.options.read_error_backoff) => {}
                    }
                    continue;
                }
            };

            self.process(record).await;
        }

        self.state.send_replace(ConsumerState::Stopping);
        info!("Stopping consumer");

        if let Err(e) = self.reader.close().await {
            error!(error = %e, "Failed to close reader");
        }
        self.dead_letter.close().await;

        self.state.send_replace(ConsumerState::Stopped);
        info!(summary = ?self.summary, "Consumer stopped");
        self.summary
    }

    /// Carry one record through decode and dispatch.
    ///
    /// Any failure leads to exactly one dead-letter write of the original
    /// bytes. A failed dead-letter write is logged and the record is dropped.
    pub async fn process(&mut self, record: Record) -> ProcessOutcome {
        debug!(
            partition = record.partition,
            offset = record.offset,
            key = %record.key_str(),
            "Message received"
        );

        let outcome = match self.evaluate(&record).await {
            Ok(outcome) => outcome,
            Err(e) => {
                let stage = e.stage();
                error!(
                    error = %e,
                    stage = stage.label(),
                    partition = record.partition,
                    offset = record.offset,
                    "Failed to process message"
                );
                match self.dead_letter.forward_record(&record).await {
                    Ok(()) => ProcessOutcome::DeadLettered(stage),
                    Err(dlq) => {
                        error!(
                            error = %dlq,
                            key = %record.key_str(),
                            "Failed to send message to dead letter topic"
                        );
                        ProcessOutcome::DeadLetterFailed(stage)
                    }
                }
            }
        };

        debug!(
            partition = record.partition,
            offset = record.offset,
            outcome = outcome.label(),
            "Message done"
        );
        self.summary.record(outcome);
        outcome
    }

    async fn evaluate(&self, record: &Record) -> Result<ProcessOutcome, PipelineError> {
        if record.value.is_empty() {
            return Err(PipelineError::EmptyValue);
        }

        let raw = codec::decode_raw(&record.value)?;
        if !codec::validate_structure(&raw) {
            return Err(CodecError::MissingFields(codec::missing_fields(&raw)).into());
        }
        let envelope = codec::decode_typed(raw)?;

        info!(
            id = %envelope.id(),
            kind = %envelope.kind(),
            timestamp = envelope.timestamp(),
            "Processing message"
        );

        let outcome = match self.options.handler_timeout {
            Some(limit) => {
                match tokio::time::timeout(limit, self.registry.dispatch(&envelope)).await {
                    Ok(outcome) => outcome,
                    Err(_) => DispatchOutcome::HandlerFailed(HandlerError::TimedOut(limit)),
                }
            }
            None => self.registry.dispatch(&envelope).await,
        };

        match outcome {
            DispatchOutcome::Handled => Ok(ProcessOutcome::Handled),
            DispatchOutcome::Unrecognized => Ok(ProcessOutcome::Unrecognized),
            DispatchOutcome::HandlerFailed(e) => Err(e.into()),
        }
    }
}
