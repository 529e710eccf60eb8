//! Stop the server on SIGINT or SIGTERM.

use std::io;
use std::thread::{self, JoinHandle};

use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use tracing::info;

use crate::server::Server;

pub const TERMINATION_SIGNALS: [i32; 2] = [SIGINT, SIGTERM];

/// Spawn a thread that stops `server` on the first SIGINT or SIGTERM, then
/// runs `after_stop`.
///
/// A blocked stdin read does not return when the server stops, so the
/// console passes a callback that exits the process.
pub fn spawn<F>(server: Server, after_stop: F) -> io::Result<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    spawn_for(&TERMINATION_SIGNALS, server, after_stop)
}

fn spawn_for<F>(signals: &[i32], server: Server, after_stop: F) -> io::Result<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    let mut signals = Signals::new(signals)?;

    thread::Builder::new()
        .name("relay-signals".to_string())
        .spawn(move || {
            if let Some(signal) = signals.forever().next() {
                info!(signal, "Shutdown signal received");
                server.stop();
                after_stop();
            }
        })
}
