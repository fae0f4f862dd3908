//! Stream handles the engine writes to
//!
//! The engine only needs a handful of capabilities from a consumer
//! endpoint: a unique key, readiness registration with the poller, a
//! non-blocking write and a non-blocking read whose bytes are thrown away.
//! Closing is always the caller's job: the engine hands every handle back
//! through [`SinkEvent::HandleReleased`](crate::server::SinkEvent).
//!
//! Adapters are provided for `mio` TCP and Unix sockets and for any
//! descriptor-backed object through [`FdHandle`].

pub mod fd;
pub mod net;

use std::fmt;
use std::io;

use mio::{Interest, Registry, Token};

pub use fd::FdHandle;

/// Identity of a stream handle inside the sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleKey(pub u64);

impl From<std::os::fd::RawFd> for HandleKey {
    fn from(fd: std::os::fd::RawFd) -> Self {
        HandleKey(fd as u64)
    }
}

impl fmt::Display for HandleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Bidirectional byte-stream endpoint attached to the sink
///
/// All I/O must be non-blocking: `send` and `recv_discard` return
/// `ErrorKind::WouldBlock` instead of waiting.
pub trait StreamHandle: Send + 'static {
    /// Unique key of this endpoint
    fn key(&self) -> HandleKey;

    /// Start watching the endpoint for `interest`
    fn register(&mut self, registry: &Registry, token: Token, interest: Interest) -> io::Result<()>;

    /// Change the watched interest
    fn reregister(&mut self, registry: &Registry, token: Token, interest: Interest)
        -> io::Result<()>;

    /// Stop watching the endpoint
    fn deregister(&mut self, registry: &Registry) -> io::Result<()>;

    /// Write as many bytes of `buf` as possible without blocking
    fn send(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Read and discard incoming bytes; `Ok(0)` means the peer closed
    fn recv_discard(&mut self, scratch: &mut [u8]) -> io::Result<usize>;
}

#[cfg(test)]
pub(crate) mod mock {
    //! In-memory handle for driving the engine without a poller

    use std::collections::VecDeque;
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;

    /// What the next `send` call does
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum SendBehavior {
        /// Accept everything
        Accept,
        /// Accept at most this many bytes per call
        Partial(usize),
        /// Accept at most this many bytes once, then block
        PartialThenBlock(usize),
        /// Return `WouldBlock`
        Block,
        /// Return `ConnectionReset`
        Reset,
        /// Return a generic error
        Fail,
    }

    #[derive(Debug)]
    pub struct MockState {
        pub written: Vec<u8>,
        pub writes: usize,
        pub behavior: SendBehavior,
        pub incoming: VecDeque<u8>,
        pub peer_closed: bool,
        pub interest: Option<Interest>,
    }

    /// Handle whose state is shared with the test through `inner`
    #[derive(Debug, Clone)]
    pub struct MockHandle {
        pub key: HandleKey,
        pub inner: Arc<Mutex<MockState>>,
    }

    impl MockHandle {
        pub fn new(key: u64) -> Self {
            Self {
                key: HandleKey(key),
                inner: Arc::new(Mutex::new(MockState {
                    written: Vec::new(),
                    writes: 0,
                    behavior: SendBehavior::Accept,
                    incoming: VecDeque::new(),
                    peer_closed: false,
                    interest: None,
                })),
            }
        }

        pub fn set_behavior(&self, behavior: SendBehavior) {
            self.inner.lock().behavior = behavior;
        }

        pub fn written(&self) -> Vec<u8> {
            self.inner.lock().written.clone()
        }
    }

    impl StreamHandle for MockHandle {
        fn key(&self) -> HandleKey {
            self.key
        }

        fn register(&mut self, _: &Registry, _: Token, interest: Interest) -> io::Result<()> {
            self.inner.lock().interest = Some(interest);
            Ok(())
        }

        fn reregister(&mut self, _: &Registry, _: Token, interest: Interest) -> io::Result<()> {
            self.inner.lock().interest = Some(interest);
            Ok(())
        }

        fn deregister(&mut self, _: &Registry) -> io::Result<()> {
            self.inner.lock().interest = None;
            Ok(())
        }

        fn send(&mut self, buf: &[u8]) -> io::Result<usize> {
            let mut state = self.inner.lock();
            let behavior = state.behavior;
            let n = match behavior {
                SendBehavior::Accept => buf.len(),
                SendBehavior::Partial(max) => buf.len().min(max),
                SendBehavior::PartialThenBlock(max) => {
                    state.behavior = SendBehavior::Block;
                    buf.len().min(max)
                }
                SendBehavior::Block => return Err(io::ErrorKind::WouldBlock.into()),
                SendBehavior::Reset => return Err(io::ErrorKind::ConnectionReset.into()),
                SendBehavior::Fail => return Err(io::Error::new(io::ErrorKind::Other, "disk on fire")),
            };
            state.written.extend_from_slice(&buf[..n]);
            state.writes += 1;
            Ok(n)
        }

        fn recv_discard(&mut self, scratch: &mut [u8]) -> io::Result<usize> {
            let mut state = self.inner.lock();
            if state.incoming.is_empty() {
                if state.peer_closed {
                    return Ok(0);
                }
                return Err(io::ErrorKind::WouldBlock.into());
            }
            let n = scratch.len().min(state.incoming.len());
            state.incoming.drain(..n);
            Ok(n)
        }
    }
}
