//! Log abstraction: the ordered, partitioned, append-only substrate.
//!
//! The pipeline only depends on the contract expressed by [`LogReader`]
//! and [`LogWriter`]: ordered per-partition delivery, at-least-once
//! reads, and a blocking read that returns as soon as the cancellation
//! token fires. [`memory::MemoryBroker`] is the bundled in-process
//! implementation.

pub mod memory;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::LogError;

pub use memory::MemoryBroker;

/// Header carrying the envelope type on primary writes.
pub const MESSAGE_TYPE_HEADER: &str = "message-type";

// ── Records ─────────────────────────────────────────────────────────

/// A transport header. Values are raw bytes, keys may repeat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub key: String,
    pub value: Vec<u8>,
}

impl Header {
    pub fn new(key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// A record to append to a topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundRecord {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    pub headers: Vec<Header>,
}

/// A record read back from a topic, with its position in the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub topic: String,
    pub partition: usize,
    pub offset: u64,
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    pub headers: Vec<Header>,
}

impl Record {
    /// First header with the given key.
    pub fn header(&self, key: &str) -> Option<&[u8]> {
        self.headers
            .iter()
            .find(|h| h.key == key)
            .map(|h| h.value.as_slice())
    }

    /// Record key as UTF-8, lossily.
    pub fn key_str(&self) -> String {
        String::from_utf8_lossy(&self.key).into_owned()
    }
}

/// How many replicas must acknowledge a write before it returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequiredAcks {
    /// Fire and forget.
    None,
    /// Leader only.
    One,
    /// Full in-sync replica set.
    All,
}

// ── Traits ──────────────────────────────────────────────────────────

/// Reads records for one consumer group. Owned by exactly one consumer.
#[async_trait]
pub trait LogReader: Send + Sync {
    /// Topic this reader consumes.
    fn topic(&self) -> &str;

    /// Block until the next record is available.
    ///
    /// Returns `Err(LogError::Cancelled)` promptly once `cancel` fires,
    /// without consuming a record.
    async fn read(&mut self, cancel: &CancellationToken) -> Result<Record, LogError>;

    /// Release the reader. Further reads fail with `LogError::Closed`.
    async fn close(&mut self) -> Result<(), LogError>;
}

/// Appends records to one topic.
#[async_trait]
pub trait LogWriter: Send + Sync {
    fn topic(&self) -> &str;

    fn acks(&self) -> RequiredAcks;

    /// Append a record, returning once the configured acks are received.
    async fn write(&self, record: OutboundRecord) -> Result<(), LogError>;

    async fn close(&self) -> Result<(), LogError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_header_lookup_returns_first_match() {
        let record = Record {
            topic: "t".into(),
            partition: 0,
            offset: 0,
            key: b"k".to_vec(),
            value: vec![],
            headers: vec![
                Header::new("message-type", "notification"),
                Header::new("message-type", "other"),
            ],
        };
        assert_eq!(record.header("message-type"), Some(&b"notification"[..]));
        assert_eq!(record.header("missing"), None);
        assert_eq!(record.key_str(), "k");
    }
}
