//! In-process partitioned log.
//!
//! Topics are created on first use. Records are assigned to a partition
//! by hashing their key (round-robin for empty keys), so all records for
//! one key keep their relative order. Each consumer group tracks one
//! committed offset per partition; an offset is committed as soon as the
//! record is handed to a reader.

use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::LogError;
use crate::log::{Header, LogReader, LogWriter, OutboundRecord, Record, RequiredAcks};

/// Default partition count for new topics.
pub const DEFAULT_PARTITIONS: usize = 3;

#[derive(Debug, Clone)]
struct StoredRecord {
    key: Vec<u8>,
    value: Vec<u8>,
    headers: Vec<Header>,
}

#[derive(Debug)]
struct TopicLog {
    partitions: Vec<Vec<StoredRecord>>,
    /// Next offset to hand out, per group, per partition.
    groups: HashMap<String, Vec<u64>>,
    round_robin: usize,
}

impl TopicLog {
    fn new(partitions: usize) -> Self {
        Self {
            partitions: vec![Vec::new(); partitions],
            groups: HashMap::new(),
            round_robin: 0,
        }
    }

    fn partition_for(&mut self, key: &[u8]) -> usize {
        let count = self.partitions.len();
        if key.is_empty() {
            let partition = self.round_robin % count;
            self.round_robin = self.round_robin.wrapping_add(1);
            return partition;
        }
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() % count as u64) as usize
    }
}

struct BrokerInner {
    partitions: usize,
    topics: Mutex<HashMap<String, TopicLog>>,
    appended: Notify,
    closed: AtomicBool,
}

impl BrokerInner {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// Shared handle to an in-process log. Cloning is cheap.
#[derive(Clone)]
pub struct MemoryBroker {
    inner: Arc<BrokerInner>,
}

impl MemoryBroker {
    /// Create a broker whose topics have `partitions` partitions (min 1).
    pub fn new(partitions: usize) -> Self {
        Self {
            inner: Arc::new(BrokerInner {
                partitions: partitions.max(1),
                topics: Mutex::new(HashMap::new()),
                appended: Notify::new(),
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn partitions(&self) -> usize {
        self.inner.partitions
    }

    /// A writer appending to `topic`.
    pub fn writer(&self, topic: impl Into<String>, acks: RequiredAcks) -> MemoryWriter {
        MemoryWriter {
            inner: Arc::clone(&self.inner),
            topic: topic.into(),
            acks,
            closed: AtomicBool::new(false),
        }
    }

    /// A reader consuming `topic` on behalf of consumer group `group`.
    pub fn reader(&self, topic: impl Into<String>, group: impl Into<String>) -> MemoryReader {
        MemoryReader {
            inner: Arc::clone(&self.inner),
            topic: topic.into(),
            group: group.into(),
            next_partition: 0,
            closed: false,
        }
    }

    /// Every record in `topic`, ordered by partition then offset.
    pub async fn snapshot(&self, topic: &str) -> Vec<Record> {
        let topics = self.inner.topics.lock().await;
        let Some(log) = topics.get(topic) else {
            return Vec::new();
        };
        log.partitions
            .iter()
            .enumerate()
            .flat_map(|(partition, records)| {
                records
                    .iter()
                    .enumerate()
                    .map(move |(offset, stored)| Record {
                        topic: topic.to_string(),
                        partition,
                        offset: offset as u64,
                        key: stored.key.clone(),
                        value: stored.value.clone(),
                        headers: stored.headers.clone(),
                    })
            })
            .collect()
    }

    /// Number of records appended to `topic`.
    pub async fn len(&self, topic: &str) -> usize {
        let topics = self.inner.topics.lock().await;
        topics
            .get(topic)
            .map(|log| log.partitions.iter().map(Vec::len).sum())
            .unwrap_or(0)
    }

    /// Shut the broker down; pending and future reads and writes fail.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::Release);
        self.inner.appended.notify_waiters();
    }
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new(DEFAULT_PARTITIONS)
    }
}

// ── Writer ──────────────────────────────────────────────────────────

pub struct MemoryWriter {
    inner: Arc<BrokerInner>,
    topic: String,
    acks: RequiredAcks,
    closed: AtomicBool,
}

#[async_trait]
impl LogWriter for MemoryWriter {
    fn topic(&self) -> &str {
        &self.topic
    }

    fn acks(&self) -> RequiredAcks {
        self.acks
    }

    async fn write(&self, record: OutboundRecord) -> Result<(), LogError> {
        if self.closed.load(Ordering::Acquire) || self.inner.is_closed() {
            return Err(LogError::Closed);
        }

        let (partition, offset) = {
            let mut topics = self.inner.topics.lock().await;
            let log = topics
                .entry(self.topic.clone())
                .or_insert_with(|| TopicLog::new(self.inner.partitions));
            let partition = log.partition_for(&record.key);
            let records = &mut log.partitions[partition];
            records.push(StoredRecord {
                key: record.key,
                value: record.value,
                headers: record.headers,
            });
            (partition, records.len() as u64 - 1)
        };

        self.inner.appended.notify_waiters();
        debug!(topic = %self.topic, partition, offset, "Record appended");
        Ok(())
    }

    async fn close(&self) -> Result<(), LogError> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

// ── Reader ──────────────────────────────────────────────────────────

pub struct MemoryReader {
    inner: Arc<BrokerInner>,
    topic: String,
    group: String,
    /// Partition to inspect first on the next read.
    next_partition: usize,
    closed: bool,
}

impl MemoryReader {
    /// Take the next uncommitted record, committing its offset.
    async fn try_next(&mut self) -> Option<Record> {
        let mut topics = self.inner.topics.lock().await;
        let log = topics
            .entry(self.topic.clone())
            .or_insert_with(|| TopicLog::new(self.inner.partitions));
        let count = log.partitions.len();
        let offsets = log
            .groups
            .entry(self.group.clone())
            .or_insert_with(|| vec![0; count]);

        for step in 0..count {
            let partition = (self.next_partition + step) % count;
            let offset = offsets[partition];
            let Some(stored) = log.partitions[partition].get(offset as usize) else {
                continue;
            };
            offsets[partition] = offset + 1;
            self.next_partition = (partition + 1) % count;
            return Some(Record {
                topic: self.topic.clone(),
                partition,
                offset,
                key: stored.key.clone(),
                value: stored.value.clone(),
                headers: stored.headers.clone(),
            });
        }
        None
    }
}

#[async_trait]
impl LogReader for MemoryReader {
    fn topic(&self) -> &str {
        &self.topic
    }

    async fn read(&mut self, cancel: &CancellationToken) -> Result<Record, LogError> {
        loop {
            if self.closed || self.inner.is_closed() {
                return Err(LogError::Closed);
            }
            if cancel.is_cancelled() {
                return Err(LogError::Cancelled);
            }

            // Register for wake-ups before checking, so an append that lands
            // between the check and the wait is not missed.
            let inner = Arc::clone(&self.inner);
            let notified = inner.appended.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(record) = self.try_next().await {
                return Ok(record);
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(LogError::Cancelled),
                _ = &mut notified => {}
            }
        }
    }

    async fn close(&mut self) -> Result<(), LogError> {
        self.closed = true;
        Ok(())
    }
}
