//! Publisher: stamps envelopes for create-message requests and appends
//! them to the primary topic.

use serde::Serialize;
use tracing::{error, info};

use crate::envelope::{self, CreationRequest, CreationResult, Envelope};
use crate::error::{CodecError, PublishError};
use crate::log::{Header, LogWriter, MESSAGE_TYPE_HEADER, OutboundRecord};

/// Writes new envelopes to the primary topic. One write attempt per call.
pub struct Publisher {
    writer: Box<dyn LogWriter>,
}

impl Publisher {
    pub fn new(writer: Box<dyn LogWriter>) -> Self {
        Self { writer }
    }

    /// Topic this publisher writes to.
    pub fn topic(&self) -> &str {
        self.writer.topic()
    }

    /// Validate the request, stamp an envelope and write it.
    ///
    /// The envelope `id` doubles as the record key; the `message-type`
    /// header carries the type so consumers can filter without decoding.
    pub async fn publish(&self, request: CreationRequest) -> Result<CreationResult, PublishError> {
        request.validate()?;

        let envelope = Envelope::new(request.kind, request.payload);
        let value = envelope::encode(&envelope).inspect_err(|e| {
            error!(error = %e, kind = %envelope.kind(), "Failed to marshal message");
        })?;

        let record = OutboundRecord {
            key: envelope.id().as_bytes().to_vec(),
            value,
            headers: vec![Header::new(MESSAGE_TYPE_HEADER, envelope.kind())],
        };

        if let Err(e) = self.writer.write(record).await {
            error!(
                error = %e,
                message_id = %envelope.id(),
                message_type = %envelope.kind(),
                "Failed to send message to log"
            );
            return Err(PublishError::Write(e));
        }

        info!(
            message_id = %envelope.id(),
            message_type = %envelope.kind(),
            topic = %self.writer.topic(),
            "Message sent successfully"
        );

        Ok(CreationResult {
            id: envelope.id().to_string(),
        })
    }

    /// Publish a typed payload, converting it to JSON first.
    pub async fn publish_payload<P: Serialize>(
        &self,
        kind: impl Into<String>,
        payload: &P,
    ) -> Result<CreationResult, PublishError> {
        let payload = serde_json::to_value(payload).map_err(CodecError::Encode)?;
        self.publish(CreationRequest::new(kind, payload)).await
    }

    /// Release the underlying writer.
    pub async fn close(&self) {
        if let Err(e) = self.writer.close().await {
            error!(error = %e, "Failed to close publisher writer");
        }
    }
}
