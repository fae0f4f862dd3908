//! Public sink handle

use std::sync::Arc;
use std::thread::JoinHandle;

use mio::{Poll, Waker};
use tokio::sync::mpsc;

use super::config::SinkConfig;
use super::event_loop::{EventLoop, Shared};
use super::events::EventReceiver;
use super::state::{SinkState, WAKE_TOKEN};
use crate::buffer::Chunk;
use crate::error::Result;
use crate::registry::{AttachError, ClientSettings};
use crate::stats::{ClientStats, SinkStats};
use crate::transport::{HandleKey, StreamHandle};

/// Fan-out sink: one producer, many non-blocking stream consumers
///
/// Created with [`FanoutSink::start`], which spawns the event loop thread
/// and returns the receiver for [`SinkEvent`](super::SinkEvent)s. Every
/// method takes `&self`; share the sink behind an `Arc` to attach clients
/// from one thread while producing from another.
///
/// Dropping the sink stops the event loop and releases every client.
pub struct FanoutSink<H: StreamHandle> {
    shared: Arc<Shared<H>>,
    worker: Option<JoinHandle<()>>,
    defaults: ClientSettings,
}

impl<H: StreamHandle> FanoutSink<H> {
    /// Validate `config` and start the event loop
    pub fn start(config: SinkConfig) -> Result<(Self, EventReceiver<H>)> {
        config.validate()?;

        let poll = Poll::new()?;
        let waker = Waker::new(poll.registry(), WAKE_TOKEN)?;
        let registry = poll.registry().try_clone()?;
        let (tx, rx) = mpsc::unbounded_channel();

        let defaults = config.client_settings();
        let capacity = config.events_capacity;
        let state = SinkState::new(config, Some(registry), tx.clone());
        let shared = Arc::new(Shared::new(state, waker));

        let worker = EventLoop::new(poll, Arc::clone(&shared), tx, capacity).spawn()?;
        tracing::info!(sync = %defaults.sync_method, "Sink started");

        Ok((
            Self {
                shared,
                worker: Some(worker),
                defaults,
            },
            rx,
        ))
    }

    /// Append a chunk and wake the event loop
    ///
    /// Chunks flagged as headers replace the header set instead of entering
    /// the queue.
    pub fn push(&self, chunk: Chunk) -> Result<()> {
        self.shared.check_running()?;
        self.shared.state.lock().push(chunk);
        self.shared.wake()?;
        Ok(())
    }

    /// Attach a handle with the configured default settings
    pub fn attach(&self, handle: H) -> std::result::Result<(), AttachError<H>> {
        self.attach_with(handle, self.defaults)
    }

    /// Attach a handle with its own sync method and burst range
    pub fn attach_with(&self, handle: H, settings: ClientSettings) -> std::result::Result<(), AttachError<H>> {
        if self.shared.check_running().is_err() {
            return Err(AttachError::Stopped(handle));
        }
        self.shared.state.lock().attach(handle, settings)?;
        self.wake();
        Ok(())
    }

    /// Remove a client as soon as the event loop gets to it
    ///
    /// Returns false if the handle is unknown or already being removed.
    pub fn detach(&self, key: HandleKey) -> bool {
        let detached = self.shared.state.lock().detach(key);
        if detached {
            self.wake();
        }
        detached
    }

    /// Let a client finish the chunks it was already assigned, then remove it
    pub fn detach_flush(&self, key: HandleKey) -> bool {
        let flushing = self.shared.state.lock().detach_flush(key);
        if flushing {
            self.wake();
        }
        flushing
    }

    /// Remove every client
    pub fn clear(&self) -> usize {
        let marked = self.shared.state.lock().clear();
        if marked > 0 {
            self.wake();
        }
        marked
    }

    /// Statistics of an attached client
    pub fn client_stats(&self, key: HandleKey) -> Option<ClientStats> {
        self.shared.state.lock().client_stats(key)
    }

    pub fn stats(&self) -> SinkStats {
        self.shared.state.lock().stats()
    }

    /// Attached clients, including ones awaiting removal
    pub fn client_count(&self) -> usize {
        self.shared.state.lock().client_count()
    }

    /// Stop the event loop and release every client
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn wake(&self) {
        if let Err(e) = self.shared.wake() {
            tracing::warn!(error = %e, "Failed to wake event loop");
        }
    }

    fn shutdown(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };

        self.shared.request_stop();
        self.wake();
        if worker.join().is_err() {
            tracing::error!("Event loop thread panicked");
        }

        self.shared.state.lock().teardown();
        tracing::info!("Sink stopped");
    }
}

impl<H: StreamHandle> Drop for FanoutSink<H> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
