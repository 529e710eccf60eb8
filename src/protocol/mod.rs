//! Relay wire protocol.
//!
//! A request/response protocol over TCP with fixed-width ASCII headers and
//! no length prefix. Each read from the socket is treated as one frame.
//!
//! ## Protocol Format
//!
//! ```text
//! Handshake:
//!   Request:  PING
//!   Response: PONG
//!
//! Log and echo:
//!   Request:  MESG hello world
//!   Response: MESG hello world
//!
//! Remote shutdown:
//!   Request:  TERM
//!   Request:  PASS <secret>
//!   Response: PWOK | PWNO | PWIV
//! ```
//!
//! `PWOK` means the secret matched and the server is shutting down, `PWNO`
//! means it did not match, and `PWIV` means the credential frame was not a
//! `PASS` frame at all. Only `TERM` is followed by a second client frame
//! without waiting for a reply, so the reader splits a `TERM` that arrived
//! glued to its `PASS`.

pub mod framed;
pub mod parser;

pub use framed::Framed;
pub use parser::{Frame, MAX_FRAME_SIZE, MAX_MESSAGE_LEN};
