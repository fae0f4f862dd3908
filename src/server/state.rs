//! Engine state shared by the producer and the event loop
//!
//! Everything here runs under the sink's state lock. The producer calls
//! [`SinkState::push`], the event loop calls the readiness handlers, and any
//! thread may attach or detach. Clients that reach a removal status are
//! finalized later by [`SinkState::finalize`], which hands their handle back
//! to the caller.

use std::io;
use std::time::{Duration, Instant};

use mio::{Interest, Registry, Token};

use crate::buffer::{
    find_limits, find_sync_frame, resolve_unit_limit, BufferQueue, Chunk, Direction, Thresholds,
};
use crate::registry::{AttachError, Client, ClientRegistry, ClientSettings, ClientStatus};
use crate::stats::metrics::ClientMetrics;
use crate::stats::{ClientStats, SinkStats};
use crate::sync::{initial_position, recover, RecoverPolicy};
use crate::transport::{HandleKey, StreamHandle};

use super::config::SinkConfig;
use super::events::{emit, EventSender, SinkEvent};

/// Token reserved for the event loop waker; clients start at 1
pub(crate) const WAKE_TOKEN: Token = Token(0);

/// Readiness reported for one client
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Readiness {
    pub readable: bool,
    pub writable: bool,
    pub closed: bool,
    pub error: bool,
}

pub(crate) struct SinkState<H> {
    config: SinkConfig,
    queue: BufferQueue,
    clients: ClientRegistry<H>,
    /// Poller registry; `None` when driven without an event loop
    registry: Option<Registry>,
    events: EventSender<H>,
    next_token: usize,
    bytes_to_serve: u64,
    bytes_served: u64,
    scratch: Vec<u8>,
}

impl<H: StreamHandle> SinkState<H> {
    pub fn new(config: SinkConfig, registry: Option<Registry>, events: EventSender<H>) -> Self {
        let scratch = vec![0u8; config.read_buffer_size];
        Self {
            config,
            queue: BufferQueue::new(),
            clients: ClientRegistry::new(),
            registry,
            events,
            next_token: WAKE_TOKEN.0 + 1,
            bytes_to_serve: 0,
            bytes_served: 0,
            scratch,
        }
    }

    /// Attach a handle
    pub fn attach(&mut self, mut handle: H, settings: ClientSettings) -> Result<(), AttachError<H>> {
        let key = handle.key();

        if settings.has_inverted_burst() {
            tracing::warn!(client = %key, "Attach rejected: burst min exceeds burst max");
            return Err(AttachError::InvalidBurst(handle));
        }

        if self.clients.contains_key(key) {
            tracing::warn!(client = %key, "Attach rejected: handle already attached");
            emit(
                &self.events,
                SinkEvent::ClientRemoving {
                    key,
                    status: ClientStatus::Duplicate,
                    stats: ClientMetrics::new().snapshot(),
                },
            );
            return Err(AttachError::Duplicate(handle));
        }

        let token = Token(self.next_token);
        if let Some(registry) = &self.registry {
            if let Err(e) = handle.register(registry, token, Interest::READABLE | Interest::WRITABLE) {
                tracing::warn!(client = %key, error = %e, "Attach rejected: registration failed");
                return Err(AttachError::Register(handle, e));
            }
        }
        self.next_token += 1;

        let mut client = Client::new(token, key, handle, settings);
        client.watching_write = true;

        if let Err(mut client) = self.clients.insert(client) {
            if let Some(registry) = &self.registry {
                if let Err(e) = client.handle.deregister(registry) {
                    tracing::debug!(client = %key, error = %e, "Deregister failed");
                }
            }
            return Err(AttachError::Duplicate(client.handle));
        }

        tracing::info!(
            client = %key,
            sync = %settings.sync_method,
            clients = self.clients.len(),
            "Client attached"
        );
        emit(&self.events, SinkEvent::ClientAdded { key });

        Ok(())
    }

    /// Mark a client for immediate removal
    ///
    /// Returns false if the handle is unknown or already being removed.
    pub fn detach(&mut self, key: HandleKey) -> bool {
        let Some(client) = self.client_by_key_mut(key) else {
            tracing::debug!(client = %key, "Detach: unknown handle");
            return false;
        };

        if !client.mark(ClientStatus::Removed) {
            tracing::debug!(client = %key, status = %client.status, "Detach: already being removed");
            return false;
        }

        tracing::info!(client = %key, "Client detached");
        true
    }

    /// Let a client drain the chunks already assigned to it, then remove it
    pub fn detach_flush(&mut self, key: HandleKey) -> bool {
        let registry = self.registry.as_ref();
        let Some(token) = self.clients.token_of(key) else {
            tracing::debug!(client = %key, "Flush: unknown handle");
            return false;
        };
        let Some(client) = self.clients.get_mut(token) else {
            return false;
        };

        if client.status != ClientStatus::Ok {
            tracing::debug!(client = %key, status = %client.status, "Flush: client not active");
            return false;
        }

        let pending = client.position.map_or(0, |p| p + 1);
        client.flush_count = Some(pending);
        client.status = ClientStatus::Flushing;
        watch_write(registry, client, true);

        tracing::info!(client = %key, pending, "Client flushing");
        true
    }

    /// Mark every live client for removal
    pub fn clear(&mut self) -> usize {
        let mut marked = 0;
        for client in self.clients.iter_mut() {
            if client.mark(ClientStatus::Removed) {
                marked += 1;
            }
        }
        tracing::info!(clients = marked, "Clearing all clients");
        marked
    }

    /// Append a chunk and advance, limit-check and recover every client
    ///
    /// Returns true when some client reached a removal status and needs to
    /// be finalized.
    pub fn push(&mut self, chunk: Chunk) -> bool {
        if chunk.is_header {
            if self.queue.push_header(chunk) {
                tracing::debug!(generation = self.queue.header_generation(), "New header set");
            }
            return false;
        }

        self.bytes_to_serve += chunk.size() as u64;
        self.queue.push(chunk);

        let queue = &self.queue;
        let registry = self.registry.as_ref();
        let max_idx = self.config.max.map(|limit| resolve_unit_limit(queue, limit));
        let soft = self
            .config
            .soft_max
            .map(|limit| (limit, resolve_unit_limit(queue, limit)));
        let policy = self.config.recover_policy;
        let timeout = self.config.timeout;
        let now = Instant::now();

        let mut keep = 0usize;
        let mut removals = false;

        for client in self.clients.iter_mut() {
            if !client.is_live() {
                continue;
            }

            let position = client.position.map_or(0, |p| p + 1);
            client.position = Some(position);

            if max_idx.is_some_and(|max| position >= max) {
                tracing::warn!(client = %client.key, position, "Client exceeded hard maximum");
                client.status = ClientStatus::Slow;
                removals = true;
                continue;
            }

            if timeout.is_some_and(|t| client.metrics.is_idle(now, t)) {
                tracing::warn!(client = %client.key, "Client timed out");
                client.status = ClientStatus::Slow;
                removals = true;
                continue;
            }

            if let Some((limit, soft_idx)) = soft {
                if position >= soft_idx && client.status == ClientStatus::Ok {
                    if let Some(recovery) = recover(queue, policy, limit, position) {
                        tracing::debug!(
                            client = %client.key,
                            from = position,
                            to = ?recovery.position,
                            dropped = recovery.dropped,
                            policy = %policy,
                            "Client recovered"
                        );
                        client.position = recovery.position;
                        client.metrics.dropped_chunks += recovery.dropped;
                        client.discont = true;
                        if policy == RecoverPolicy::ResyncLatest {
                            client.new_connection = true;
                        }
                    }
                }
            }

            if let Some(p) = client.position {
                keep = keep.max(p + 1);
                if !watch_write(registry, client, true) {
                    removals = true;
                }
            }
        }

        let retention = self.config.retention();
        if !retention.is_unset() {
            if let Some(limits) = find_limits(queue, &retention, &Thresholds::default()) {
                keep = keep.max(limits.min_idx + 1);
            }
        }

        if self.config.sync_method.needs_keyframe() {
            if let Some(idx) = find_sync_frame(queue, 0, Direction::Older) {
                keep = keep.max(idx + 1);
            }
        }

        let dropped = self.queue.trim(keep);
        tracing::trace!(queued = self.queue.len(), dropped, "Chunk pushed");

        removals
    }

    /// Dispatch one readiness event
    pub fn handle_event(&mut self, token: Token, ready: Readiness) {
        if ready.error {
            if let Some(client) = self.clients.get_mut(token) {
                if client.mark(ClientStatus::Error) {
                    tracing::debug!(client = %client.key, "Client socket error");
                }
            }
            return;
        }

        if ready.readable || ready.closed {
            self.handle_read(token, ready.closed);
        }

        if ready.writable {
            self.handle_write(token);
        }
    }

    /// Drain unwanted input; detect a closed peer
    pub fn handle_read(&mut self, token: Token, closed: bool) {
        let Some(client) = self.clients.get_mut(token) else {
            return;
        };
        if !client.is_live() {
            return;
        }

        if !self.config.drain_input {
            if closed && client.mark(ClientStatus::Closed) {
                tracing::debug!(client = %client.key, "Peer closed");
            }
            return;
        }

        loop {
            match client.handle.recv_discard(&mut self.scratch) {
                Ok(0) => {
                    client.mark(ClientStatus::Closed);
                    tracing::debug!(client = %client.key, "Peer closed");
                    return;
                }
                Ok(n) => {
                    tracing::trace!(client = %client.key, bytes = n, "Discarded client input");
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    let status = status_for_error(&e);
                    client.mark(status);
                    tracing::debug!(client = %client.key, error = %e, status = %status, "Read failed");
                    return;
                }
            }
        }
    }

    /// Write as much as possible to a client without blocking
    pub fn handle_write(&mut self, token: Token) {
        let registry = self.registry.as_ref();
        let queue = &self.queue;
        let resend_headers = self.config.resend_headers;
        let Some(client) = self.clients.get_mut(token) else {
            return;
        };
        if !client.is_live() {
            return;
        }

        loop {
            if client.send_queue.is_empty() {
                let Some(mut position) = client.position else {
                    // Client is ahead of the producer; wait for the next chunk
                    watch_write(registry, client, false);
                    if client.flush_count == Some(0) {
                        client.status = ClientStatus::Removed;
                    }
                    return;
                };

                if client.new_connection && client.status == ClientStatus::Ok {
                    let settings = &mut client.settings;
                    let resolved = initial_position(
                        queue,
                        Some(position),
                        &mut settings.sync_method,
                        settings.burst_min,
                        settings.burst_max,
                    );
                    match resolved {
                        Some(p) => {
                            tracing::debug!(
                                client = %client.key,
                                position = p,
                                sync = %client.settings.sync_method,
                                "Client positioned"
                            );
                            client.new_connection = false;
                            client.position = Some(p);
                            position = p;
                        }
                        None => {
                            client.position = None;
                            watch_write(registry, client, false);
                            return;
                        }
                    }
                }

                if client.flush_count == Some(0) {
                    client.status = ClientStatus::Removed;
                    return;
                }

                let Some(chunk) = queue.get(position).cloned() else {
                    client.position = None;
                    continue;
                };

                client.position = position.checked_sub(1);
                if let Some(count) = client.flush_count.as_mut() {
                    *count -= 1;
                }
                client.metrics.record_chunk(chunk.timestamp);
                queue_chunk(queue, resend_headers, client, chunk);
            }

            let Some(head) = client.send_queue.front() else {
                continue;
            };
            let remaining = &head.data[client.send_offset..];
            if remaining.is_empty() {
                client.send_queue.pop_front();
                client.send_offset = 0;
                continue;
            }
            let remaining_len = remaining.len();

            match client.handle.send(remaining) {
                Ok(0) => {
                    client.mark(ClientStatus::Error);
                    tracing::debug!(client = %client.key, "Write returned zero bytes");
                    return;
                }
                Ok(n) => {
                    client.metrics.record_write(n);
                    self.bytes_served += n as u64;
                    tracing::trace!(client = %client.key, bytes = n, "Wrote to client");

                    if n < remaining_len {
                        // Keep writing the rest until the handle would block
                        client.send_offset += n;
                        continue;
                    }
                    client.send_queue.pop_front();
                    client.send_offset = 0;
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    watch_write(registry, client, true);
                    return;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    let status = status_for_error(&e);
                    client.mark(status);
                    tracing::debug!(client = %client.key, error = %e, status = %status, "Write failed");
                    return;
                }
            }
        }
    }

    /// Mark a client slow if it has been inactive past the timeout
    pub fn expire_idle(&mut self, token: Token, now: Instant) -> bool {
        let Some(timeout) = self.config.timeout else {
            return false;
        };
        let Some(client) = self.clients.get_mut(token) else {
            return false;
        };
        if client.is_live() && client.metrics.is_idle(now, timeout) && client.mark(ClientStatus::Slow) {
            tracing::warn!(client = %client.key, "Client timed out");
            return true;
        }
        false
    }

    /// Remove a client that reached a removal status
    ///
    /// Stops watching the handle, drops its pending chunks, emits
    /// `ClientRemoving`, removes it from the registry and hands the handle
    /// back with `HandleReleased`. Returns false for live or unknown clients.
    pub fn finalize(&mut self, token: Token) -> bool {
        let Some(client) = self.clients.get_mut(token) else {
            return false;
        };
        if client.is_live() {
            return false;
        }

        if let Some(registry) = &self.registry {
            if let Err(e) = client.handle.deregister(registry) {
                tracing::debug!(client = %client.key, error = %e, "Deregister failed");
            }
        }
        client.clear_send_queue();
        client.metrics.record_disconnect();

        let key = client.key;
        let status = client.status;
        let stats = client.stats();

        tracing::info!(
            client = %key,
            status = %status,
            bytes_sent = stats.bytes_sent,
            dropped = stats.dropped_chunks,
            "Removing client"
        );
        emit(&self.events, SinkEvent::ClientRemoving { key, status, stats });

        let Some(client) = self.clients.remove(token) else {
            return false;
        };
        emit(&self.events, SinkEvent::HandleReleased { key, handle: client.handle });

        true
    }

    /// Finalize every client that reached a removal status
    pub fn finalize_all(&mut self) -> usize {
        self.clients
            .tokens()
            .into_iter()
            .filter(|&token| self.finalize(token))
            .count()
    }

    /// Release every client and drop the buffered history
    pub fn teardown(&mut self) {
        self.clear();
        self.finalize_all();
        self.queue.clear();
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.config.timeout
    }

    pub fn cookie(&self) -> u64 {
        self.clients.cookie()
    }

    pub fn token_at(&self, index: usize) -> Option<Token> {
        self.clients.token_at(index)
    }

    pub fn client_stats(&self, key: HandleKey) -> Option<ClientStats> {
        let token = self.clients.token_of(key)?;
        self.clients.get(token).map(Client::stats)
    }

    #[cfg(test)]
    pub fn client(&self, key: HandleKey) -> Option<&Client<H>> {
        let token = self.clients.token_of(key)?;
        self.clients.get(token)
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    #[cfg(test)]
    pub fn queue(&self) -> &BufferQueue {
        &self.queue
    }

    pub fn stats(&self) -> SinkStats {
        SinkStats {
            clients: self.clients.len(),
            queued_chunks: self.queue.len(),
            queued_bytes: self.queue.size(),
            bytes_to_serve: self.bytes_to_serve,
            bytes_served: self.bytes_served,
        }
    }

    fn client_by_key_mut(&mut self, key: HandleKey) -> Option<&mut Client<H>> {
        let token = self.clients.token_of(key)?;
        self.clients.get_mut(token)
    }
}

/// Turn writability watching on or off
///
/// Returns false if the poller refused the change; the client is then
/// marked as errored.
fn watch_write<H: StreamHandle>(registry: Option<&Registry>, client: &mut Client<H>, on: bool) -> bool {
    if client.watching_write == on {
        return true;
    }

    if let Some(registry) = registry {
        let interest = if on {
            Interest::READABLE | Interest::WRITABLE
        } else {
            Interest::READABLE
        };
        if let Err(e) = client.handle.reregister(registry, client.token, interest) {
            tracing::debug!(client = %client.key, error = %e, "Reregister failed");
            client.mark(ClientStatus::Error);
            return false;
        }
    }

    client.watching_write = on;
    true
}

/// Queue a data chunk, preceded by the header set when the client needs it
fn queue_chunk<H>(queue: &BufferQueue, resend_headers: bool, client: &mut Client<H>, chunk: Chunk) {
    let headers = queue.headers();
    if !headers.is_empty() {
        let generation = queue.header_generation();
        let send_headers = client.discont
            || match client.headers_sent {
                None => true,
                Some(sent) => sent != generation && resend_headers,
            };
        if send_headers {
            tracing::trace!(client = %client.key, generation, "Queueing header set");
            client.send_queue.extend(headers.iter().cloned());
        }
        client.headers_sent = Some(generation);
    }

    client.discont = false;
    client.send_queue.push_back(chunk);
}

fn status_for_error(err: &io::Error) -> ClientStatus {
    match err.kind() {
        io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::UnexpectedEof => ClientStatus::Closed,
        _ => ClientStatus::Error,
    }
}
