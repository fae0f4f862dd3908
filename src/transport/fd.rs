//! Adapter for arbitrary descriptor-backed objects
//!
//! Pipes, character devices or already-connected sockets from other
//! libraries can be attached by wrapping them in [`FdHandle`]. The wrapped
//! descriptor must already be in non-blocking mode.

use std::io::{self, Read, Write};
use std::os::fd::AsRawFd;

use mio::unix::SourceFd;
use mio::{Interest, Registry, Token};

use super::{HandleKey, StreamHandle};

/// Stream handle over any `Read + Write` object with a descriptor
#[derive(Debug)]
pub struct FdHandle<T> {
    inner: T,
}

impl<T> FdHandle<T>
where
    T: AsRawFd + Read + Write + Send + 'static,
{
    /// Wrap a non-blocking descriptor-backed object
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    /// Get a reference to the wrapped object
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Unwrap, returning the original object
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T> StreamHandle for FdHandle<T>
where
    T: AsRawFd + Read + Write + Send + 'static,
{
    fn key(&self) -> HandleKey {
        self.inner.as_raw_fd().into()
    }

    fn register(&mut self, registry: &Registry, token: Token, interest: Interest) -> io::Result<()> {
        registry.register(&mut SourceFd(&self.inner.as_raw_fd()), token, interest)
    }

    fn reregister(&mut self, registry: &Registry, token: Token, interest: Interest) -> io::Result<()> {
        registry.reregister(&mut SourceFd(&self.inner.as_raw_fd()), token, interest)
    }

    fn deregister(&mut self, registry: &Registry) -> io::Result<()> {
        registry.deregister(&mut SourceFd(&self.inner.as_raw_fd()))
    }

    fn send(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn recv_discard(&mut self, scratch: &mut [u8]) -> io::Result<usize> {
        self.inner.read(scratch)
    }
}

#[cfg(test)]
mod tests {
    use std::os::unix::net::UnixStream;

    use super::*;

    #[test]
    fn test_fd_handle_roundtrip() {
        let (a, b) = UnixStream::pair().unwrap();
        a.set_nonblocking(true).unwrap();
        b.set_nonblocking(true).unwrap();
        let raw = a.as_raw_fd();

        let mut handle = FdHandle::new(a);
        assert_eq!(handle.key(), HandleKey::from(raw));
        assert_eq!(handle.send(b"xyz").unwrap(), 3);

        let mut peer = FdHandle::new(b);
        let mut scratch = [0u8; 8];
        assert_eq!(peer.recv_discard(&mut scratch).unwrap(), 3);

        // The wrapped object comes back intact
        let inner = handle.into_inner();
        assert_eq!(inner.as_raw_fd(), raw);
    }

    #[test]
    fn test_fd_handle_registers_with_poll() {
        let poll = mio::Poll::new().unwrap();
        let (a, _b) = UnixStream::pair().unwrap();
        a.set_nonblocking(true).unwrap();

        let mut handle = FdHandle::new(a);
        handle
            .register(poll.registry(), Token(7), Interest::READABLE)
            .unwrap();
        handle
            .reregister(poll.registry(), Token(7), Interest::READABLE | Interest::WRITABLE)
            .unwrap();
        handle.deregister(poll.registry()).unwrap();
    }
}
