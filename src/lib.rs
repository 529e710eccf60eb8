//! simple-relay: a multi-client TCP message relay.
//!
//! Clients open with a `PING`/`PONG` handshake, then send `MESG` frames that
//! the server appends to a log file and echoes back. A `TERM` request
//! followed by the correct `PASS` shuts the whole server down.
//!
//! Features:
//! - One OS thread per connection, with a shared connection registry
//! - Append-only message log with whole-line atomic appends
//! - Graceful shutdown that unblocks the accept call and every open session,
//!   triggered remotely, from the console, or by SIGINT/SIGTERM
//! - Configuration via CLI arguments or TOML file

pub mod client;
pub mod config;
pub mod console;
pub mod log_sink;
pub mod protocol;
pub mod server;
#[cfg(unix)]
pub mod shutdown;

pub use client::{Client, ClientError};
pub use server::{LifecycleState, Server, ServerError, Verdict};
