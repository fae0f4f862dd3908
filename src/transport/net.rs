//! Socket adapters
//!
//! `mio` sockets are non-blocking by construction, so they plug into the
//! sink as-is. The raw descriptor doubles as the handle key.

use std::io::{self, Read, Write};
use std::os::fd::AsRawFd;

use mio::net::{TcpStream, UnixStream};
use mio::{Interest, Registry, Token};

use super::{HandleKey, StreamHandle};

impl StreamHandle for TcpStream {
    fn key(&self) -> HandleKey {
        self.as_raw_fd().into()
    }

    fn register(&mut self, registry: &Registry, token: Token, interest: Interest) -> io::Result<()> {
        registry.register(self, token, interest)
    }

    fn reregister(&mut self, registry: &Registry, token: Token, interest: Interest) -> io::Result<()> {
        registry.reregister(self, token, interest)
    }

    fn deregister(&mut self, registry: &Registry) -> io::Result<()> {
        registry.deregister(self)
    }

    fn send(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write(buf)
    }

    fn recv_discard(&mut self, scratch: &mut [u8]) -> io::Result<usize> {
        self.read(scratch)
    }
}

impl StreamHandle for UnixStream {
    fn key(&self) -> HandleKey {
        self.as_raw_fd().into()
    }

    fn register(&mut self, registry: &Registry, token: Token, interest: Interest) -> io::Result<()> {
        registry.register(self, token, interest)
    }

    fn reregister(&mut self, registry: &Registry, token: Token, interest: Interest) -> io::Result<()> {
        registry.reregister(self, token, interest)
    }

    fn deregister(&mut self, registry: &Registry) -> io::Result<()> {
        registry.deregister(self)
    }

    fn send(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write(buf)
    }

    fn recv_discard(&mut self, scratch: &mut [u8]) -> io::Result<usize> {
        self.read(scratch)
    }
}
