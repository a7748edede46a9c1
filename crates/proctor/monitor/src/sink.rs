//! Activity sinks and delivery to the logging collaborator.
//!
//! The controller reports every transition through a synchronous [`ActivitySink`] and never
//! waits on delivery. [`ChannelSink`] hands records to a [`LogForwarder`] task, which calls
//! an async [`ActivityLogger`] and parks failed records in a bounded [`RetryBuffer`].

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use proctor_types::{ActivityKind, ActivityRecord};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::LogDeliveryError;

// ── Sinks ───────────────────────────────────────────────────────────────

/// Fire-and-forget destination for activity records.
pub trait ActivitySink: Send + Sync {
    /// Submit a record. Must not block and must not fail.
    fn submit(&self, record: ActivityRecord);
}

/// In-memory sink for tests and trace replay.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: RwLock<Vec<ActivityRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All records submitted so far
    pub fn records(&self) -> Vec<ActivityRecord> {
        self.records.read().clone()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    pub fn count_of(&self, kind: ActivityKind) -> usize {
        self.records
            .read()
            .iter()
            .filter(|r| r.kind() == Some(kind))
            .count()
    }

    pub fn clear(&self) {
        self.records.write().clear();
    }
}

impl ActivitySink for MemorySink {
    fn submit(&self, record: ActivityRecord) {
        self.records.write().push(record);
    }
}

/// Sink that only traces records.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ActivitySink for TracingSink {
    fn submit(&self, record: ActivityRecord) {
        info!(
            channel = record.channel.path(),
            activity = %record.entry.activity,
            session_id = %record.entry.session_id,
            question = ?record.entry.question_index,
            "Activity"
        );
    }
}

/// Sink that queues records for a [`LogForwarder`].
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<ActivityRecord>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ActivityRecord>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ActivitySink for ChannelSink {
    fn submit(&self, record: ActivityRecord) {
        if self.tx.send(record).is_err() {
            debug!("Log forwarder stopped, dropping activity record");
        }
    }
}

// ── Delivery ────────────────────────────────────────────────────────────

/// Async delivery to the logging collaborator.
#[async_trait]
pub trait ActivityLogger: Send + Sync {
    async fn deliver(&self, record: &ActivityRecord) -> Result<(), LogDeliveryError>;

    fn name(&self) -> &str;
}

/// Bounded FIFO of records whose delivery failed. The oldest record is dropped on overflow.
#[derive(Debug)]
pub struct RetryBuffer {
    queue: VecDeque<ActivityRecord>,
    capacity: usize,
    dropped: u64,
}

impl RetryBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            capacity: capacity.max(1),
            dropped: 0,
        }
    }

    pub fn push(&mut self, record: ActivityRecord) {
        if self.queue.len() >= self.capacity {
            self.queue.pop_front();
            self.dropped += 1;
        }
        self.queue.push_back(record);
    }

    pub fn pop_front(&mut self) -> Option<ActivityRecord> {
        self.queue.pop_front()
    }

    /// Return a record to the head after a failed retry.
    pub fn restore_front(&mut self, record: ActivityRecord) {
        self.queue.push_front(record);
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Records discarded because the buffer was full
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

/// Counters reported when a forwarder exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ForwarderStats {
    pub delivered: u64,
    pub failed_attempts: u64,
    pub pending: usize,
    pub dropped: u64,
}

/// Background task draining a [`ChannelSink`] into an [`ActivityLogger`].
pub struct LogForwarder {
    logger: Arc<dyn ActivityLogger>,
    buffer: RetryBuffer,
    retry_interval: Duration,
    stats: ForwarderStats,
}

impl LogForwarder {
    pub fn new(
        logger: Arc<dyn ActivityLogger>,
        retry_capacity: usize,
        retry_interval: Duration,
    ) -> Self {
        Self {
            logger,
            buffer: RetryBuffer::new(retry_capacity),
            retry_interval,
            stats: ForwarderStats::default(),
        }
    }

    /// Spawn the forwarder. It exits once every sender is dropped, after one last flush.
    pub fn spawn(self, rx: mpsc::UnboundedReceiver<ActivityRecord>) -> JoinHandle<ForwarderStats> {
        tokio::spawn(self.run(rx))
    }

    pub async fn run(mut self, mut rx: mpsc::UnboundedReceiver<ActivityRecord>) -> ForwarderStats {
        let mut retry = tokio::time::interval(self.retry_interval);
        retry.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        retry.tick().await;

        loop {
            tokio::select! {
                record = rx.recv() => match record {
                    Some(record) => self.forward(record).await,
                    None => break,
                },
                _ = retry.tick() => self.flush().await,
            }
        }

        self.flush().await;
        self.stats.pending = self.buffer.len();
        self.stats.dropped = self.buffer.dropped();
        debug!(logger = self.logger.name(), stats = ?self.stats, "Log forwarder stopped");
        self.stats
    }

    async fn forward(&mut self, record: ActivityRecord) {
        match self.logger.deliver(&record).await {
            Ok(()) => {
                self.stats.delivered += 1;
                if !self.buffer.is_empty() {
                    self.flush().await;
                }
            }
            Err(e) => {
                warn!(
                    logger = self.logger.name(),
                    activity = %record.entry.activity,
                    error = %e,
                    "Activity delivery failed, queued for retry"
                );
                self.stats.failed_attempts += 1;
                self.buffer.push(record);
            }
        }
    }

    async fn flush(&mut self) {
        while let Some(record) = self.buffer.pop_front() {
            match self.logger.deliver(&record).await {
                Ok(()) => self.stats.delivered += 1,
                Err(e) => {
                    debug!(error = %e, pending = self.buffer.len() + 1, "Retry flush interrupted");
                    self.stats.failed_attempts += 1;
                    self.buffer.restore_front(record);
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use proctor_types::{SessionId, SubjectId};
    use std::sync::atomic::{AtomicBool, Ordering};

    fn record(kind: ActivityKind) -> ActivityRecord {
        ActivityRecord::new(
            kind,
            SubjectId::new("alice"),
            SessionId::generate(),
            None,
            None,
            Utc::now(),
        )
    }

    /// Logger that fails while `down` is set and records what it delivered.
    #[derive(Default)]
    struct FlakyLogger {
        down: AtomicBool,
        delivered: RwLock<Vec<String>>,
    }

    #[async_trait]
    impl ActivityLogger for FlakyLogger {
        async fn deliver(&self, record: &ActivityRecord) -> Result<(), LogDeliveryError> {
            if self.down.load(Ordering::SeqCst) {
                return Err(LogDeliveryError::new("connection refused"));
            }
            self.delivered.write().push(record.entry.activity.clone());
            Ok(())
        }

        fn name(&self) -> &str {
            "flaky"
        }
    }

    #[test]
    fn test_memory_sink_counts_by_kind() {
        let sink = MemorySink::new();
        sink.submit(record(ActivityKind::SessionPaused));
        sink.submit(record(ActivityKind::SessionPaused));
        sink.submit(record(ActivityKind::SessionResumed));
        assert_eq!(sink.len(), 3);
        assert_eq!(sink.count_of(ActivityKind::SessionPaused), 2);
        assert_eq!(sink.count_of(ActivityKind::SessionTerminated), 0);
    }

    #[test]
    fn test_retry_buffer_drops_oldest() {
        let mut buffer = RetryBuffer::new(2);
        buffer.push(record(ActivityKind::SessionStarted));
        buffer.push(record(ActivityKind::SessionPaused));
        buffer.push(record(ActivityKind::SessionResumed));

        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.dropped(), 1);
        assert_eq!(
            buffer.pop_front().and_then(|r| r.kind()),
            Some(ActivityKind::SessionPaused)
        );
    }

    #[tokio::test]
    async fn test_failed_records_are_retried_in_order() {
        let logger = Arc::new(FlakyLogger::default());
        logger.down.store(true, Ordering::SeqCst);

        let (sink, rx) = ChannelSink::new();
        let forwarder = LogForwarder::new(logger.clone(), 16, Duration::from_secs(3600)).spawn(rx);

        sink.submit(record(ActivityKind::SessionStarted));
        sink.submit(record(ActivityKind::SessionPaused));
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;

        logger.down.store(false, Ordering::SeqCst);
        sink.submit(record(ActivityKind::SessionResumed));
        drop(sink);

        let stats = forwarder.await.unwrap();
        assert_eq!(stats.delivered, 3);
        assert_eq!(stats.pending, 0);
        assert_eq!(
            *logger.delivered.read(),
            vec!["Session Resumed", "Session Started", "Session Paused"]
        );
    }

    #[tokio::test]
    async fn test_forwarder_reports_pending_when_collaborator_stays_down() {
        let logger = Arc::new(FlakyLogger::default());
        logger.down.store(true, Ordering::SeqCst);

        let (sink, rx) = ChannelSink::new();
        let forwarder = LogForwarder::new(logger, 16, Duration::from_secs(3600)).spawn(rx);
        sink.submit(record(ActivityKind::SessionTerminated));
        drop(sink);

        let stats = forwarder.await.unwrap();
        assert_eq!(stats.delivered, 0);
        assert_eq!(stats.pending, 1);
    }
}
