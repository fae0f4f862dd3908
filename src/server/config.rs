//! Sink configuration

use std::time::Duration;

use crate::buffer::{Limit, Thresholds};
use crate::error::{Error, Result};
use crate::registry::ClientSettings;
use crate::sync::{RecoverPolicy, SyncMethod};

/// Sink configuration options
#[derive(Debug, Clone)]
pub struct SinkConfig {
    /// Hard maximum lag; clients beyond it are removed as slow
    pub max: Option<Limit>,

    /// Soft maximum lag; clients beyond it go through recovery
    pub soft_max: Option<Limit>,

    /// How clients past the soft maximum are repositioned
    pub recover_policy: RecoverPolicy,

    /// Default sync method for new clients
    pub sync_method: SyncMethod,

    /// Default minimum burst for new clients
    pub burst_min: Option<Limit>,

    /// Default maximum burst for new clients
    pub burst_max: Option<Limit>,

    /// Remove clients that could not be written to for this long
    pub timeout: Option<Duration>,

    /// Always keep at least this many bytes queued
    pub bytes_min: Option<u64>,

    /// Always keep at least this much time queued
    pub time_min: Option<Duration>,

    /// Always keep at least this many chunks queued
    pub buffers_min: Option<usize>,

    /// Send the new header set to clients when it changes
    pub resend_headers: bool,

    /// Read and discard bytes sent by clients
    pub drain_input: bool,

    /// Scratch buffer size for discarded input
    pub read_buffer_size: usize,

    /// Capacity of the poll events buffer
    pub events_capacity: usize,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            max: None,
            soft_max: None,
            recover_policy: RecoverPolicy::None,
            sync_method: SyncMethod::Latest,
            burst_min: None,
            burst_max: None,
            timeout: None,
            bytes_min: None,
            time_min: None,
            buffers_min: None,
            resend_headers: true,
            drain_input: true,
            read_buffer_size: 4 * 1024, // 4KB
            events_capacity: 256,
        }
    }
}

impl SinkConfig {
    /// Set the hard maximum
    pub fn max(mut self, limit: Limit) -> Self {
        self.max = Some(limit);
        self
    }

    /// Set the soft maximum
    pub fn soft_max(mut self, limit: Limit) -> Self {
        self.soft_max = Some(limit);
        self
    }

    /// Set the recover policy
    pub fn recover_policy(mut self, policy: RecoverPolicy) -> Self {
        self.recover_policy = policy;
        self
    }

    /// Set the default sync method
    pub fn sync_method(mut self, method: SyncMethod) -> Self {
        self.sync_method = method;
        self
    }

    /// Set the default burst range
    pub fn burst(mut self, min: Option<Limit>, max: Option<Limit>) -> Self {
        self.burst_min = min;
        self.burst_max = max;
        self
    }

    /// Set the inactivity timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the minimum retention
    pub fn retain_min(mut self, bytes: Option<u64>, time: Option<Duration>, buffers: Option<usize>) -> Self {
        self.bytes_min = bytes;
        self.time_min = time;
        self.buffers_min = buffers;
        self
    }

    /// Only send the header set once per client
    pub fn disable_header_resend(mut self) -> Self {
        self.resend_headers = false;
        self
    }

    /// Leave client input unread
    pub fn disable_input_drain(mut self) -> Self {
        self.drain_input = false;
        self
    }

    /// Client settings derived from the defaults
    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings::new(self.sync_method).burst(self.burst_min, self.burst_max)
    }

    /// Minimum retention as thresholds
    pub(crate) fn retention(&self) -> Thresholds {
        Thresholds {
            bytes: self.bytes_min,
            buffers: self.buffers_min,
            time: self.time_min,
        }
    }

    /// Check the configuration for contradictions
    pub fn validate(&self) -> Result<()> {
        if let (Some(soft), Some(hard)) = (self.soft_max, self.max) {
            if soft.exceeds(&hard) == Some(true) {
                return Err(Error::Config(format!(
                    "soft max ({}) exceeds hard max ({})",
                    soft, hard
                )));
            }
        }

        if self.client_settings().has_inverted_burst() {
            return Err(Error::Config("burst min exceeds burst max".into()));
        }

        if self.read_buffer_size == 0 || self.events_capacity == 0 {
            return Err(Error::Config("buffer sizes must be non-zero".into()));
        }

        Ok(())
    }
}
