//! Frame-at-a-time reader/writer over a byte stream.

use bytes::{Bytes, BytesMut};
use std::io::{self, Read, Write};

use super::parser::{coalesced_term, Frame, MAX_FRAME_SIZE};

/// Wraps a duplex stream and exchanges whole frames over it.
///
/// One `read` call yields one frame. The only exception is a `TERM` glued
/// to the `PASS` that follows it; the remainder is held back and returned
/// by the next `read_frame`.
pub struct Framed<S> {
    stream: S,
    buffer: BytesMut,
    pending: Option<Bytes>,
}

impl<S: Read + Write> Framed<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            buffer: BytesMut::with_capacity(MAX_FRAME_SIZE),
            pending: None,
        }
    }

    /// Read the next raw frame. `Ok(None)` means the peer closed the connection.
    pub fn read_frame(&mut self) -> io::Result<Option<Bytes>> {
        if let Some(frame) = self.pending.take() {
            return Ok(Some(frame));
        }

        self.buffer.clear();
        self.buffer.resize(MAX_FRAME_SIZE, 0);
        let n = self.stream.read(&mut self.buffer)?;
        if n == 0 {
            return Ok(None);
        }
        self.buffer.truncate(n);

        let mut frame = self.buffer.split().freeze();
        if let Some(at) = coalesced_term(&frame) {
            self.pending = Some(frame.split_off(at));
        }
        Ok(Some(frame))
    }

    /// Write raw frame bytes as-is.
    pub fn write_raw(&mut self, frame: &[u8]) -> io::Result<()> {
        self.stream.write_all(frame)?;
        self.stream.flush()
    }

    /// Encode and write a frame.
    pub fn send(&mut self, frame: &Frame) -> io::Result<()> {
        self.write_raw(&frame.encode())
    }

    pub fn get_ref(&self) -> &S {
        &self.stream
    }
}

/// In-memory duplex stream that hands out one scripted chunk per read.
#[cfg(test)]
pub(crate) mod mock {
    use std::collections::VecDeque;
    use std::io::{self, Read, Write};

    #[derive(Default)]
    pub struct ScriptedStream {
        pub reads: VecDeque<io::Result<Vec<u8>>>,
        pub written: Vec<Vec<u8>>,
    }

    impl ScriptedStream {
        pub fn new(chunks: &[&[u8]]) -> Self {
            Self {
                reads: chunks.iter().map(|c| Ok(c.to_vec())).collect(),
                written: Vec::new(),
            }
        }

        pub fn then_error(mut self, kind: io::ErrorKind) -> Self {
            self.reads.push_back(Err(io::Error::from(kind)));
            self
        }
    }

    impl Read for ScriptedStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.reads.pop_front() {
                Some(Ok(chunk)) => {
                    buf[..chunk.len()].copy_from_slice(&chunk);
                    Ok(chunk.len())
                }
                Some(Err(e)) => Err(e),
                None => Ok(0),
            }
        }
    }

    impl Write for ScriptedStream {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.written.push(buf.to_vec());
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::ScriptedStream;
    use super::*;

    #[test]
    fn test_one_read_is_one_frame() {
        let mut framed = Framed::new(ScriptedStream::new(&[b"PING", b"MESG hi"]));
        assert_eq!(framed.read_frame().unwrap().unwrap(), &b"PING"[..]);
        assert_eq!(framed.read_frame().unwrap().unwrap(), &b"MESG hi"[..]);
        assert!(framed.read_frame().unwrap().is_none());
    }

    #[test]
    fn test_splits_coalesced_term() {
        let mut framed = Framed::new(ScriptedStream::new(&[b"TERMPASS secret"]));
        assert_eq!(framed.read_frame().unwrap().unwrap(), &b"TERM"[..]);
        assert_eq!(framed.read_frame().unwrap().unwrap(), &b"PASS secret"[..]);
        assert!(framed.read_frame().unwrap().is_none());
    }

    #[test]
    fn test_read_error_propagates() {
        let stream = ScriptedStream::default().then_error(io::ErrorKind::ConnectionReset);
        let mut framed = Framed::new(stream);
        let err = framed.read_frame().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);
    }

    #[test]
    fn test_send_encodes() {
        let mut framed = Framed::new(ScriptedStream::default());
        framed.send(&Frame::Pong).unwrap();
        framed.write_raw(b"MESG raw").unwrap();
        assert_eq!(
            framed.get_ref().written,
            vec![b"PONG".to_vec(), b"MESG raw".to_vec()]
        );
    }
}
