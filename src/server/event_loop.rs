//! Event loop thread
//!
//! A dedicated thread blocks in `mio::Poll`, dispatches readiness to the
//! engine state and finalizes clients that reached a removal status. The
//! producer wakes it through a `mio::Waker` registered under
//! [`WAKE_TOKEN`](super::state::WAKE_TOKEN).

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use mio::{Events, Poll, Waker};
use parking_lot::Mutex;

use super::events::{emit, EventSender, SinkEvent};
use super::state::{Readiness, SinkState, WAKE_TOKEN};
use crate::error::{Error, Result};
use crate::transport::StreamHandle;

/// State shared between the sink handle and the event loop thread
pub(crate) struct Shared<H> {
    pub state: Mutex<SinkState<H>>,
    waker: Waker,
    running: AtomicBool,
    failure: Mutex<Option<String>>,
}

impl<H> Shared<H> {
    pub fn new(state: SinkState<H>, waker: Waker) -> Self {
        Self {
            state: Mutex::new(state),
            waker,
            running: AtomicBool::new(true),
            failure: Mutex::new(None),
        }
    }

    /// Interrupt the current poll
    pub fn wake(&self) -> io::Result<()> {
        self.waker.wake()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Ask the event loop to exit after its current iteration
    pub fn request_stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    /// Fail if the loop stopped, reporting its failure if it had one
    pub fn check_running(&self) -> Result<()> {
        if let Some(message) = self.failure.lock().as_ref() {
            return Err(Error::EventLoop(message.clone()));
        }
        if !self.is_running() {
            return Err(Error::Stopped);
        }
        Ok(())
    }

    fn fail(&self, message: String) {
        *self.failure.lock() = Some(message);
        self.request_stop();
    }
}

pub(crate) struct EventLoop<H> {
    poll: Poll,
    events: Events,
    shared: Arc<Shared<H>>,
    notify: EventSender<H>,
}

impl<H: StreamHandle> EventLoop<H> {
    pub fn new(poll: Poll, shared: Arc<Shared<H>>, notify: EventSender<H>, capacity: usize) -> Self {
        Self {
            poll,
            events: Events::with_capacity(capacity),
            shared,
            notify,
        }
    }

    /// Run the loop on a named thread
    pub fn spawn(self) -> io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("fanout-event-loop".into())
            .spawn(move || {
                let mut event_loop = self;
                event_loop.run();
            })
    }

    fn run(&mut self) {
        let timeout = self.shared.state.lock().timeout();
        tracing::debug!(?timeout, "Event loop started");

        while self.shared.is_running() {
            if let Err(e) = self.poll.poll(&mut self.events, timeout) {
                if e.kind() == io::ErrorKind::Interrupted {
                    continue;
                }

                tracing::error!(error = %e, "Poll failed, stopping event loop");
                let message = format!("poll failed: {}", e);
                self.shared.fail(message.clone());
                emit(&self.notify, SinkEvent::Fatal { message });
                return;
            }

            if !self.shared.is_running() {
                break;
            }

            for event in self.events.iter() {
                let token = event.token();
                if token == WAKE_TOKEN {
                    continue;
                }

                let ready = Readiness {
                    readable: event.is_readable(),
                    writable: event.is_writable(),
                    closed: event.is_read_closed() || event.is_write_closed(),
                    error: event.is_error(),
                };
                self.shared.state.lock().handle_event(token, ready);
            }

            self.maintain();
        }

        tracing::debug!("Event loop stopped");
    }

    /// Expire idle clients and finalize terminal ones
    ///
    /// The state lock is taken once per client so the producer is never
    /// held off for a whole pass. If the registry changes between two lock
    /// sections the pass restarts from the first client.
    pub fn maintain(&self) -> usize {
        let mut pass = MaintainPass::new(Instant::now(), self.shared.state.lock().cookie());
        loop {
            let mut state = self.shared.state.lock();
            if !pass.step(&mut state) {
                break;
            }
        }

        if pass.finalized > 0 {
            tracing::debug!(finalized = pass.finalized, "Finalized clients");
        }
        pass.finalized
    }
}

/// Cursor of a maintenance pass over the registry
struct MaintainPass {
    now: Instant,
    index: usize,
    cookie: u64,
    finalized: usize,
}

impl MaintainPass {
    fn new(now: Instant, cookie: u64) -> Self {
        Self {
            now,
            index: 0,
            cookie,
            finalized: 0,
        }
    }

    /// Visit the client under the cursor; false once past the last one
    fn step<H: StreamHandle>(&mut self, state: &mut SinkState<H>) -> bool {
        if state.cookie() != self.cookie {
            self.cookie = state.cookie();
            self.index = 0;
        }

        let Some(token) = state.token_at(self.index) else {
            return false;
        };

        state.expire_idle(token, self.now);
        if state.finalize(token) {
            // Removal shifted the next client into this slot
            self.cookie = state.cookie();
            self.finalized += 1;
        } else {
            self.index += 1;
        }
        true
    }
}
