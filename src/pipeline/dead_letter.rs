//! Dead-letter forwarder: republishes unprocessable records to a side topic.

use chrono::Utc;
use tracing::{debug, error, warn};

use crate::error::DeadLetterError;
use crate::log::{Header, LogWriter, OutboundRecord, Record, RequiredAcks};

/// Header appended to every dead-lettered record, in epoch milliseconds.
pub const ERROR_TIMESTAMP_HEADER: &str = "error-timestamp";

/// Copies failed records verbatim to the dead-letter topic.
pub struct DeadLetterForwarder {
    writer: Box<dyn LogWriter>,
}

impl DeadLetterForwarder {
    pub fn new(writer: Box<dyn LogWriter>) -> Self {
        if writer.acks() != RequiredAcks::One {
            warn!(
                topic = %writer.topic(),
                acks = ?writer.acks(),
                "Dead-letter writer is not configured for leader acks"
            );
        }
        Self { writer }
    }

    pub fn topic(&self) -> &str {
        self.writer.topic()
    }

    /// Write one record to the dead-letter topic.
    ///
    /// The value and key are copied unchanged. Headers keep their order and
    /// gain a trailing `error-timestamp`. A single attempt is made.
    pub async fn forward(
        &self,
        value: &[u8],
        key: &[u8],
        headers: &[Header],
    ) -> Result<(), DeadLetterError> {
        let record = dead_letter_record(value, key, headers, Utc::now().timestamp_millis());

        self.writer
            .write(record)
            .await
            .map_err(|source| DeadLetterError::Write {
                topic: self.writer.topic().to_string(),
                source,
            })?;

        debug!(
            topic = %self.writer.topic(),
            key = %String::from_utf8_lossy(key),
            "Message forwarded to dead letter topic"
        );
        Ok(())
    }

    /// Forward a record exactly as it was read.
    pub async fn forward_record(&self, record: &Record) -> Result<(), DeadLetterError> {
        self.forward(&record.value, &record.key, &record.headers).await
    }

    pub async fn close(&self) {
        if let Err(e) = self.writer.close().await {
            error!(error = %e, "Failed to close dead-letter writer");
        }
    }
}

fn dead_letter_record(value: &[u8], key: &[u8], headers: &[Header], now_ms: i64) -> OutboundRecord {
    let mut headers = headers.to_vec();
    headers.push(Header::new(ERROR_TIMESTAMP_HEADER, now_ms.to_string()));
    OutboundRecord {
        key: key.to_vec(),
        value: value.to_vec(),
        headers,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LogError;
    use crate::log::{MESSAGE_TYPE_HEADER, MemoryBroker};

    #[test]
    fn record_appends_timestamp_after_original_headers() {
        let headers = vec![
            Header::new(MESSAGE_TYPE_HEADER, "notification"),
            Header::new("trace", "abc"),
        ];
        let record = dead_letter_record(b"{not json", b"key-1", &headers, 1_700_000_000_000);

        assert_eq!(record.value, b"{not json");
        assert_eq!(record.key, b"key-1");
        assert_eq!(record.headers.len(), 3);
        assert_eq!(record.headers[..2], headers[..]);
        assert_eq!(
            record.headers[2],
            Header::new(ERROR_TIMESTAMP_HEADER, "1700000000000")
        );
    }

    #[tokio::test]
    async fn forward_record_preserves_bytes_and_key() {
        let broker = MemoryBroker::new(1);
        let forwarder = DeadLetterForwarder::new(Box::new(broker.writer("dead-letter", RequiredAcks::One)));

        // Invalid UTF-8 survives untouched.
        let original = Record {
            topic: "notifications".into(),
            partition: 0,
            offset: 7,
            key: b"abc".to_vec(),
            value: vec![0xff, 0xfe, b'{'],
            headers: vec![Header::new(MESSAGE_TYPE_HEADER, "notification")],
        };
        let before = Utc::now().timestamp_millis();
        forwarder.forward_record(&original).await.unwrap();

        let written = broker.snapshot("dead-letter").await;
        assert_eq!(written.len(), 1);
        let dlq = &written[0];
        assert_eq!(dlq.value, original.value);
        assert_eq!(dlq.key, original.key);
        assert_eq!(dlq.header(MESSAGE_TYPE_HEADER), Some(&b"notification"[..]));

        let stamp: i64 = String::from_utf8(dlq.header(ERROR_TIMESTAMP_HEADER).unwrap().to_vec())
            .unwrap()
            .parse()
            .unwrap();
        assert!(stamp >= before);
    }

    #[tokio::test]
    async fn forward_failure_is_reported() {
        let broker = MemoryBroker::new(1);
        let writer = broker.writer("dead-letter", RequiredAcks::One);
        writer.close().await.unwrap();
        let forwarder = DeadLetterForwarder::new(Box::new(writer));

        let err = forwarder.forward(b"x", b"k", &[]).await.unwrap_err();
        let DeadLetterError::Write { topic, source } = err;
        assert_eq!(topic, "dead-letter");
        assert!(matches!(source, LogError::Closed));
        assert_eq!(broker.len("dead-letter").await, 0);
    }
}
