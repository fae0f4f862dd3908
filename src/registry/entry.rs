//! Client entry and status types
//!
//! This module defines the per-client state stored in the registry.

use std::collections::VecDeque;
use std::fmt;

use mio::Token;

use crate::buffer::{Chunk, Limit};
use crate::stats::metrics::ClientMetrics;
use crate::stats::ClientStats;
use crate::sync::SyncMethod;
use crate::transport::HandleKey;

/// Status of a client
///
/// `Ok` and `Flushing` are live; every other status means the client is
/// waiting to be removed. `Duplicate` is only ever reported for a rejected
/// attach and never describes a registered client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientStatus {
    /// Receiving data normally
    Ok,
    /// Peer closed the connection
    Closed,
    /// Removed on request
    Removed,
    /// Fell behind the hard maximum or timed out
    Slow,
    /// Transport error
    Error,
    /// Attach rejected: handle already attached
    Duplicate,
    /// Draining what it already has, then removed
    Flushing,
}

impl ClientStatus {
    /// Whether the client still takes part in data delivery
    pub fn is_live(&self) -> bool {
        matches!(self, ClientStatus::Ok | ClientStatus::Flushing)
    }
}

impl fmt::Display for ClientStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ClientStatus::Ok => "ok",
            ClientStatus::Closed => "closed",
            ClientStatus::Removed => "removed",
            ClientStatus::Slow => "slow",
            ClientStatus::Error => "error",
            ClientStatus::Duplicate => "duplicate",
            ClientStatus::Flushing => "flushing",
        };
        f.write_str(name)
    }
}

/// Per-client positioning settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClientSettings {
    /// Where the client starts in the buffer history
    pub sync_method: SyncMethod,
    /// Minimum burst for the burst sync methods
    pub burst_min: Option<Limit>,
    /// Maximum burst for the burst sync methods
    pub burst_max: Option<Limit>,
}

impl ClientSettings {
    pub fn new(sync_method: SyncMethod) -> Self {
        Self {
            sync_method,
            ..Default::default()
        }
    }

    pub fn burst(mut self, min: Option<Limit>, max: Option<Limit>) -> Self {
        self.burst_min = min;
        self.burst_max = max;
        self
    }

    /// Whether the burst range is inverted (only comparable within one unit)
    pub fn has_inverted_burst(&self) -> bool {
        match (self.burst_min, self.burst_max) {
            (Some(min), Some(max)) => min.exceeds(&max).unwrap_or(false),
            _ => false,
        }
    }
}

/// A consumer attached to the sink
pub struct Client<H> {
    /// Poll token, unique for the lifetime of the sink
    pub token: Token,
    /// Key of the handle
    pub key: HandleKey,
    /// The handle itself; returned to the caller on removal
    pub handle: H,
    /// Current status
    pub status: ClientStatus,
    /// Index of the next chunk to send (`None` = nothing assigned yet)
    pub position: Option<usize>,
    /// Chunks left to send before a flushing client is removed
    pub flush_count: Option<usize>,
    /// Chunks being written out
    pub send_queue: VecDeque<Chunk>,
    /// Bytes of the head of `send_queue` already written
    pub send_offset: usize,
    /// Positioning settings; the sync method may switch to next-keyframe
    pub settings: ClientSettings,
    /// True until the initial position is resolved
    pub new_connection: bool,
    /// Set when recovery skipped data
    pub discont: bool,
    /// Whether writability is currently watched
    pub watching_write: bool,
    /// Header generation last queued to this client
    pub headers_sent: Option<u64>,
    pub(crate) metrics: ClientMetrics,
}

impl<H> Client<H> {
    pub fn new(token: Token, key: HandleKey, handle: H, settings: ClientSettings) -> Self {
        Self {
            token,
            key,
            handle,
            status: ClientStatus::Ok,
            position: None,
            flush_count: None,
            send_queue: VecDeque::new(),
            send_offset: 0,
            settings,
            new_connection: true,
            discont: false,
            watching_write: false,
            headers_sent: None,
            metrics: ClientMetrics::new(),
        }
    }

    /// Whether the client still takes part in data delivery
    pub fn is_live(&self) -> bool {
        self.status.is_live()
    }

    /// Move to a removal status; a no-op once the client left `Ok`/`Flushing`
    ///
    /// Returns true if the status changed.
    pub fn mark(&mut self, status: ClientStatus) -> bool {
        if !self.is_live() {
            return false;
        }
        self.status = status;
        true
    }

    /// Snapshot of the client's statistics
    pub fn stats(&self) -> ClientStats {
        self.metrics.snapshot()
    }

    /// Drop every chunk still waiting to be written
    pub fn clear_send_queue(&mut self) {
        self.send_queue.clear();
        self.send_offset = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_client() {
        let client = Client::new(Token(1), HandleKey(5), (), ClientSettings::default());
        assert_eq!(client.status, ClientStatus::Ok);
        assert!(client.position.is_none());
        assert!(client.flush_count.is_none());
        assert!(client.new_connection);
        assert!(client.send_queue.is_empty());
    }

    #[test]
    fn test_mark_only_from_live() {
        let mut client = Client::new(Token(1), HandleKey(5), (), ClientSettings::default());
        assert!(client.mark(ClientStatus::Flushing));
        assert!(client.is_live());
        assert!(client.mark(ClientStatus::Slow));
        assert!(!client.is_live());

        // Terminal statuses stick
        assert!(!client.mark(ClientStatus::Closed));
        assert_eq!(client.status, ClientStatus::Slow);
    }

    #[test]
    fn test_inverted_burst() {
        let settings =
            ClientSettings::new(SyncMethod::Burst).burst(Some(Limit::Bytes(500)), Some(Limit::Bytes(100)));
        assert!(settings.has_inverted_burst());

        // Different units cannot be compared
        let settings = ClientSettings::new(SyncMethod::Burst)
            .burst(Some(Limit::Bytes(500)), Some(Limit::Buffers(1)));
        assert!(!settings.has_inverted_burst());
    }

    #[test]
    fn test_status_display() {
        assert_eq!(ClientStatus::Slow.to_string(), "slow");
        assert_eq!(ClientStatus::Duplicate.to_string(), "duplicate");
    }
}
