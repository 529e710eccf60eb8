//! Shared handle to a client socket.
//!
//! The worker reads and writes through the handle; the registry and the
//! lifecycle keep clones so shutdown can force the socket closed. The file
//! descriptor itself is released when the last clone is dropped.

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use tracing::debug;

#[derive(Debug)]
pub struct Connection {
    stream: TcpStream,
    peer: SocketAddr,
}

impl Connection {
    pub fn new(stream: TcpStream, peer: SocketAddr) -> Self {
        Self { stream, peer }
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Shut down both directions. Idempotent: a blocked read on any clone
    /// returns end-of-stream.
    pub fn close(&self) {
        match self.stream.shutdown(Shutdown::Both) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotConnected => {}
            Err(e) => debug!(peer = %self.peer, error = %e, "Socket shutdown failed"),
        }
    }
}

impl Read for &Connection {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (&self.stream).read(buf)
    }
}

impl Write for &Connection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        (&self.stream).write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        (&self.stream).flush()
    }
}
