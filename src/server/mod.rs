//! TCP relay server.
//!
//! ## Architecture
//!
//! ```text
//! +--------+
//! | Server |  <- owns the listener, accept thread and workers
//! +--------+
//!      |  one thread per connection
//!      v
//! +-----------+     +---------+     +-------------+
//! | Handshake | --> | Session | --> | Termination |  <- TERM credential check
//! +-----------+     +---------+     +-------------+
//!      |
//!      v
//! +----------+
//! | Registry |  <- live sessions, force-closed on shutdown
//! +----------+
//! ```
//!
//! Per-connection failures stay inside that connection's worker. Only
//! resource setup (log file, listener) can fail `start`.

pub mod connection;
pub mod handshake;
pub mod lifecycle;
pub mod registry;
pub mod session;
pub mod termination;

pub use lifecycle::{LifecycleState, Server, ServerError};
pub use termination::Verdict;
