//! Per-connection command loop.

use std::io::{self, Read, Write};
use std::net::SocketAddr;
use tracing::{debug, info, warn};

use crate::log_sink::LogSink;
use crate::protocol::{Frame, Framed};
use crate::server::termination::{self, Verdict};

/// The slice of server lifecycle a session needs.
pub trait Lifecycle {
    fn is_running(&self) -> bool;
    fn stop(&self);
}

/// Why a session ended.
#[derive(Debug)]
pub enum SessionEnd {
    /// Empty read: the peer closed, or shutdown closed the socket.
    Disconnected,
    /// An authorized `TERM` stopped the server.
    Terminated,
    /// The server was no longer running at the top of the loop.
    ServerStopped,
    /// Read or write failed (peer reset and the like).
    Transport(io::Error),
}

/// Everything a session shares with the rest of the server.
pub struct SessionContext<'a, L> {
    pub peer: SocketAddr,
    pub log: &'a LogSink,
    pub secret: &'a [u8],
    pub lifecycle: &'a L,
}

/// Process frames until the session ends. Frames are handled strictly in
/// arrival order.
pub fn run<S, L>(framed: &mut Framed<S>, ctx: &SessionContext<'_, L>) -> SessionEnd
where
    S: Read + Write,
    L: Lifecycle,
{
    while ctx.lifecycle.is_running() {
        let raw = match framed.read_frame() {
            Ok(Some(raw)) => raw,
            Ok(None) => return SessionEnd::Disconnected,
            Err(e) => return SessionEnd::Transport(e),
        };

        match Frame::parse(&raw) {
            Frame::Message(text) => {
                if let Err(e) = ctx.log.append_line(&text) {
                    warn!(peer = %ctx.peer, path = %ctx.log.path().display(), error = %e, "Failed to append message to log");
                }
                if let Err(e) = framed.write_raw(&raw) {
                    return SessionEnd::Transport(e);
                }
                debug!(peer = %ctx.peer, bytes = text.len(), "Message logged and echoed");
            }
            Frame::Term => match termination::validate(framed, ctx.secret) {
                Ok(Verdict::Authorized) => {
                    info!(peer = %ctx.peer, "Authorized termination request");
                    ctx.lifecycle.stop();
                    return SessionEnd::Terminated;
                }
                Ok(verdict) => {
                    warn!(peer = %ctx.peer, ?verdict, "Termination request refused");
                }
                Err(e) => return SessionEnd::Transport(e),
            },
            other => {
                debug!(peer = %ctx.peer, frame = ?other, "Ignoring unrecognized frame");
            }
        }
    }

    SessionEnd::ServerStopped
}
