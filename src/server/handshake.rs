//! Opening handshake for new connections.

use std::io::{self, Read, Write};

use crate::protocol::{Frame, Framed};

/// Outcome of the opening exchange.
#[derive(Debug)]
pub enum Handshake {
    Accepted,
    Rejected(Rejection),
}

/// Why a handshake failed. The connection must be closed without a reply.
#[derive(Debug)]
pub enum Rejection {
    /// The first frame was not `PING`.
    UnexpectedFrame(Frame),
    /// The peer closed before sending anything.
    Disconnected,
    Transport(io::Error),
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::UnexpectedFrame(frame) => write!(f, "unexpected opening frame {frame:?}"),
            Rejection::Disconnected => write!(f, "peer disconnected before handshake"),
            Rejection::Transport(e) => write!(f, "transport error during handshake: {e}"),
        }
    }
}

impl std::error::Error for Rejection {}

/// Read exactly one frame and answer `PONG` if it is `PING`.
///
/// No retries: any other outcome is terminal for the connection.
pub fn attempt<S: Read + Write>(framed: &mut Framed<S>) -> Handshake {
    let raw = match framed.read_frame() {
        Ok(Some(raw)) => raw,
        Ok(None) => return Handshake::Rejected(Rejection::Disconnected),
        Err(e) => return Handshake::Rejected(Rejection::Transport(e)),
    };

    match Frame::parse(&raw) {
        Frame::Ping => match framed.send(&Frame::Pong) {
            Ok(()) => Handshake::Accepted,
            Err(e) => Handshake::Rejected(Rejection::Transport(e)),
        },
        other => Handshake::Rejected(Rejection::UnexpectedFrame(other)),
    }
}
