//! Statistics and metrics for attached clients

use std::time::{Duration, Instant, SystemTime};

/// Per-client statistics
#[derive(Debug, Clone)]
pub struct ClientStats {
    /// Total bytes written to the client
    pub bytes_sent: u64,
    /// Wall-clock time the client was attached
    pub connect_time: SystemTime,
    /// Wall-clock time the client was removed, if it was
    pub disconnect_time: Option<SystemTime>,
    /// Time spent attached
    pub connected_duration: Duration,
    /// Wall-clock time of the last successful write (or the attach)
    pub last_activity_time: SystemTime,
    /// Chunks skipped by recovery
    pub dropped_chunks: u64,
    /// Timestamp of the first chunk sent
    pub first_chunk_ts: Option<Duration>,
    /// Timestamp of the last chunk sent
    pub last_chunk_ts: Option<Duration>,
}

/// Running counters kept inside a client, snapshotted into [`ClientStats`]
#[derive(Debug, Clone)]
pub(crate) struct ClientMetrics {
    pub bytes_sent: u64,
    pub dropped_chunks: u64,
    pub first_chunk_ts: Option<Duration>,
    pub last_chunk_ts: Option<Duration>,
    pub connect_time: SystemTime,
    pub connected_at: Instant,
    pub disconnect_time: Option<SystemTime>,
    pub disconnected_at: Option<Instant>,
    pub last_activity_time: SystemTime,
    pub last_activity: Instant,
}

impl ClientMetrics {
    pub fn new() -> Self {
        let now = Instant::now();
        let wall = SystemTime::now();
        Self {
            bytes_sent: 0,
            dropped_chunks: 0,
            first_chunk_ts: None,
            last_chunk_ts: None,
            connect_time: wall,
            connected_at: now,
            disconnect_time: None,
            disconnected_at: None,
            last_activity_time: wall,
            last_activity: now,
        }
    }

    /// Record a successful write of `bytes`
    pub fn record_write(&mut self, bytes: usize) {
        self.bytes_sent += bytes as u64;
        self.last_activity = Instant::now();
        self.last_activity_time = SystemTime::now();
    }

    /// Record the timestamp of a chunk taken from the queue
    pub fn record_chunk(&mut self, timestamp: Option<Duration>) {
        if let Some(ts) = timestamp {
            self.first_chunk_ts.get_or_insert(ts);
            self.last_chunk_ts = Some(ts);
        }
    }

    pub fn record_disconnect(&mut self) {
        if self.disconnected_at.is_none() {
            self.disconnected_at = Some(Instant::now());
            self.disconnect_time = Some(SystemTime::now());
        }
    }

    /// Whether nothing was written for longer than `timeout`
    pub fn is_idle(&self, now: Instant, timeout: Duration) -> bool {
        now.saturating_duration_since(self.last_activity) > timeout
    }

    pub fn snapshot(&self) -> ClientStats {
        let end = self.disconnected_at.unwrap_or_else(Instant::now);
        ClientStats {
            bytes_sent: self.bytes_sent,
            connect_time: self.connect_time,
            disconnect_time: self.disconnect_time,
            connected_duration: end.saturating_duration_since(self.connected_at),
            last_activity_time: self.last_activity_time,
            dropped_chunks: self.dropped_chunks,
            first_chunk_ts: self.first_chunk_ts,
            last_chunk_ts: self.last_chunk_ts,
        }
    }
}

/// Sink-wide statistics
#[derive(Debug, Clone, Default)]
pub struct SinkStats {
    /// Attached clients (including ones awaiting removal)
    pub clients: usize,
    /// Chunks currently held in the queue
    pub queued_chunks: usize,
    /// Bytes currently held in the queue
    pub queued_bytes: u64,
    /// Total bytes pushed by the producer
    pub bytes_to_serve: u64,
    /// Total bytes written to all clients
    pub bytes_served: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_metrics_new() {
        let metrics = ClientMetrics::new();
        let stats = metrics.snapshot();
        assert_eq!(stats.bytes_sent, 0);
        assert_eq!(stats.dropped_chunks, 0);
        assert!(stats.disconnect_time.is_none());
        assert!(stats.first_chunk_ts.is_none());
    }

    #[test]
    fn test_record_write() {
        let mut metrics = ClientMetrics::new();
        metrics.record_write(100);
        metrics.record_write(28);
        assert_eq!(metrics.snapshot().bytes_sent, 128);
    }

    #[test]
    fn test_record_chunk_timestamps() {
        let mut metrics = ClientMetrics::new();
        metrics.record_chunk(None);
        metrics.record_chunk(Some(Duration::from_millis(40)));
        metrics.record_chunk(None);
        metrics.record_chunk(Some(Duration::from_millis(80)));

        let stats = metrics.snapshot();
        assert_eq!(stats.first_chunk_ts, Some(Duration::from_millis(40)));
        assert_eq!(stats.last_chunk_ts, Some(Duration::from_millis(80)));
    }

    #[test]
    fn test_disconnect_freezes_duration() {
        let mut metrics = ClientMetrics::new();
        metrics.record_disconnect();
        let first = metrics.snapshot();
        std::thread::sleep(Duration::from_millis(5));
        let second = metrics.snapshot();

        assert!(first.disconnect_time.is_some());
        assert_eq!(first.connected_duration, second.connected_duration);
    }

    #[test]
    fn test_is_idle() {
        let metrics = ClientMetrics::new();
        let later = Instant::now() + Duration::from_secs(10);
        assert!(metrics.is_idle(later, Duration::from_secs(5)));
        assert!(!metrics.is_idle(later, Duration::from_secs(60)));
    }

    #[test]
    fn test_sink_stats_default() {
        let stats = SinkStats::default();
        assert_eq!(stats.clients, 0);
        assert_eq!(stats.bytes_served, 0);
    }
}
