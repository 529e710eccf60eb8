//! Server lifecycle: listening socket, accept loop, workers and shutdown.
//!
//! One accept thread plus one OS thread per connection. A blocking `accept`
//! cannot be interrupted directly, so `stop` connects to the server's own
//! address to make it return, after which the accept thread sees the
//! `Stopping` state and drops the listener.

use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::log_sink::LogSink;
use crate::protocol::Framed;
use crate::server::connection::Connection;
use crate::server::handshake::{self, Handshake};
use crate::server::registry::ConnectionRegistry;
use crate::server::session::{self, Lifecycle, SessionContext, SessionEnd};

/// Listen backlog for the relay socket.
const LISTEN_BACKLOG: i32 = 128;

/// Upper bound on the self-connect used to wake the accept thread.
const WAKE_TIMEOUT: Duration = Duration::from_secs(1);

/// Pause after a failed `accept` so persistent errors (e.g. EMFILE) do not spin.
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(50);

/// Lifecycle states. `Stopped` is both initial and terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LifecycleState::Stopped => "stopped",
            LifecycleState::Starting => "starting",
            LifecycleState::Running => "running",
            LifecycleState::Stopping => "stopping",
        };
        f.write_str(name)
    }
}

/// Errors that abort `start`. The server stays `Stopped`.
#[derive(Debug)]
pub enum ServerError {
    AlreadyRunning(LifecycleState),
    LogSink(PathBuf, io::Error),
    Bind(SocketAddr, io::Error),
    Spawn(io::Error),
}

impl std::fmt::Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerError::AlreadyRunning(state) => {
                write!(f, "Server cannot start while {}", state)
            }
            ServerError::LogSink(path, e) => {
                write!(f, "Failed to create log file '{}': {}", path.display(), e)
            }
            ServerError::Bind(addr, e) => write!(f, "Failed to bind {}: {}", addr, e),
            ServerError::Spawn(e) => write!(f, "Failed to spawn accept thread: {}", e),
        }
    }
}

impl std::error::Error for ServerError {}

/// A spawned connection worker and the socket it serves.
struct Worker {
    handle: JoinHandle<()>,
    conn: Arc<Connection>,
}

/// Resources that exist only between a successful `start` and `stop`.
struct Runtime {
    local_addr: SocketAddr,
    acceptor: Option<JoinHandle<()>>,
}

/// State shared by the accept thread, every worker and the operator.
pub struct ServerState {
    secret: Vec<u8>,
    state: Mutex<LifecycleState>,
    state_changed: Condvar,
    runtime: Mutex<Option<Runtime>>,
    registry: ConnectionRegistry<Arc<Connection>>,
    workers: Mutex<Vec<Worker>>,
}

/// Cheaply cloneable handle to a relay server instance.
#[derive(Clone)]
pub struct Server {
    state: Arc<ServerState>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Server {
    /// Create a stopped server guarded by `secret`.
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Server {
            state: Arc::new(ServerState {
                secret: secret.into(),
                state: Mutex::new(LifecycleState::Stopped),
                state_changed: Condvar::new(),
                runtime: Mutex::new(None),
                registry: ConnectionRegistry::new(),
                workers: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn state(&self) -> LifecycleState {
        *lock(&self.state.state)
    }

    /// Address the listener is bound to while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        lock(&self.state.runtime).as_ref().map(|rt| rt.local_addr)
    }

    /// Number of connections past the handshake.
    pub fn connection_count(&self) -> usize {
        self.state.registry.len()
    }

    pub fn is_registered(&self, addr: &SocketAddr) -> bool {
        self.state.registry.contains(addr)
    }

    /// Block until the server is `Stopped` or `timeout` elapses.
    /// Returns whether it is stopped. `None` waits indefinitely.
    pub fn wait_until_stopped(&self, timeout: Option<Duration>) -> bool {
        let guard = lock(&self.state.state);
        let not_stopped = |s: &mut LifecycleState| *s != LifecycleState::Stopped;
        match timeout {
            Some(timeout) => {
                let (guard, _) = self
                    .state
                    .state_changed
                    .wait_timeout_while(guard, timeout, not_stopped)
                    .unwrap_or_else(PoisonError::into_inner);
                *guard == LifecycleState::Stopped
            }
            None => {
                let guard = self
                    .state
                    .state_changed
                    .wait_while(guard, not_stopped)
                    .unwrap_or_else(PoisonError::into_inner);
                *guard == LifecycleState::Stopped
            }
        }
    }

    /// Move from `from` to `to`; fails with the current state otherwise.
    fn transition(&self, from: LifecycleState, to: LifecycleState) -> Result<(), LifecycleState> {
        let mut state = lock(&self.state.state);
        if *state != from {
            return Err(*state);
        }
        *state = to;
        self.state.state_changed.notify_all();
        Ok(())
    }

    fn set_state(&self, to: LifecycleState) {
        *lock(&self.state.state) = to;
        self.state.state_changed.notify_all();
    }

    /// Create the log file, bind the listener and start accepting.
    ///
    /// Returns the bound address. Resource failures leave the server
    /// `Stopped`.
    pub fn start(&self, bind: SocketAddr, log_path: &Path) -> Result<SocketAddr, ServerError> {
        self.transition(LifecycleState::Stopped, LifecycleState::Starting)
            .map_err(ServerError::AlreadyRunning)?;

        match self.open_resources(bind, log_path) {
            Ok((listener, local_addr, sink)) => self.launch(listener, local_addr, sink),
            Err(e) => {
                self.set_state(LifecycleState::Stopped);
                Err(e)
            }
        }
    }

    fn open_resources(
        &self,
        bind: SocketAddr,
        log_path: &Path,
    ) -> Result<(TcpListener, SocketAddr, Arc<LogSink>), ServerError> {
        let sink = LogSink::open(log_path)
            .map_err(|e| ServerError::LogSink(log_path.to_path_buf(), e))?;
        let listener = create_listener(bind).map_err(|e| ServerError::Bind(bind, e))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| ServerError::Bind(bind, e))?;
        Ok((listener, local_addr, Arc::new(sink)))
    }

    fn launch(
        &self,
        listener: TcpListener,
        local_addr: SocketAddr,
        sink: Arc<LogSink>,
    ) -> Result<SocketAddr, ServerError> {
        // Hold the runtime slot so a concurrent stop waits for the handle.
        let mut runtime = lock(&self.state.runtime);
        self.set_state(LifecycleState::Running);

        let server = self.clone();
        let spawned = thread::Builder::new()
            .name("relay-accept".to_string())
            .spawn(move || server.accept_loop(listener, sink));

        match spawned {
            Ok(handle) => {
                *runtime = Some(Runtime {
                    local_addr,
                    acceptor: Some(handle),
                });
                info!(address = %local_addr, "Server listening");
                Ok(local_addr)
            }
            Err(e) => {
                self.set_state(LifecycleState::Stopped);
                Err(ServerError::Spawn(e))
            }
        }
    }

    fn accept_loop(&self, listener: TcpListener, sink: Arc<LogSink>) {
        let mut next_id: u64 = 0;

        loop {
            let accepted = listener.accept();

            if self.state() != LifecycleState::Running {
                if let Ok((_, peer)) = accepted {
                    debug!(peer = %peer, "Dropping connection accepted during shutdown");
                }
                break;
            }

            let (stream, peer) = match accepted {
                Ok(accepted) => accepted,
                Err(e) => {
                    backoff_after_accept_error(&e);
                    continue;
                }
            };

            debug!(peer = %peer, "New connection");
            next_id += 1;
            self.spawn_worker(next_id, Connection::new(stream, peer), Arc::clone(&sink));
        }

        debug!("Accept loop finished, closing listener");
    }

    fn spawn_worker(&self, id: u64, conn: Connection, sink: Arc<LogSink>) {
        let conn = Arc::new(conn);
        let server = self.clone();
        let worker_conn = Arc::clone(&conn);

        let spawned = thread::Builder::new()
            .name(format!("relay-conn-{id}"))
            .spawn(move || server.serve_connection(worker_conn, sink));

        match spawned {
            Ok(handle) => {
                let mut workers = lock(&self.state.workers);
                workers.retain(|w| !w.handle.is_finished());
                workers.push(Worker { handle, conn });
            }
            Err(e) => {
                error!(peer = %conn.peer_addr(), error = %e, "Failed to spawn connection worker");
                conn.close();
            }
        }
    }

    /// Worker body: handshake, register, run the session, deregister.
    fn serve_connection(&self, conn: Arc<Connection>, sink: Arc<LogSink>) {
        let peer = conn.peer_addr();
        let mut framed = Framed::new(&*conn);

        if let Handshake::Rejected(reason) = handshake::attempt(&mut framed) {
            debug!(peer = %peer, reason = %reason, "Handshake failed");
            conn.close();
            return;
        }

        info!(peer = %peer, "Handshake complete");
        if self.state.registry.insert(peer, Arc::clone(&conn)).is_some() {
            warn!(peer = %peer, "Replaced stale registry entry");
        }

        let ctx = SessionContext {
            peer,
            log: &sink,
            secret: &self.state.secret,
            lifecycle: self,
        };
        match session::run(&mut framed, &ctx) {
            SessionEnd::Transport(e) => debug!(peer = %peer, error = %e, "Connection lost"),
            end => debug!(peer = %peer, ?end, "Session ended"),
        }

        self.state.registry.remove(&peer);
        conn.close();
        info!(peer = %peer, "Connection closed");
    }

    /// Shut the server down. A no-op unless the server is `Running`.
    ///
    /// May be called from a connection worker; that worker is not joined.
    pub fn stop(&self) {
        if let Err(state) = self.transition(LifecycleState::Running, LifecycleState::Stopping) {
            debug!(%state, "Stop requested while not running");
            return;
        }
        info!("Stopping server");

        let runtime = lock(&self.state.runtime).take();
        if let Some(mut runtime) = runtime {
            let woken = wake_acceptor(runtime.local_addr);
            match runtime.acceptor.take() {
                Some(acceptor) if woken => join_unless_current(acceptor, "accept thread"),
                // Joining would block until some other client connects.
                Some(_) => warn!("Accept thread not woken, detaching it"),
                None => {}
            }
        }

        for (addr, conn) in self.state.registry.snapshot() {
            conn.close();
            self.state.registry.remove(&addr);
        }

        let workers = std::mem::take(&mut *lock(&self.state.workers));
        // Workers still in the handshake are not registered yet.
        for worker in &workers {
            worker.conn.close();
        }
        for worker in workers {
            join_unless_current(worker.handle, "connection worker");
        }

        self.set_state(LifecycleState::Stopped);
        info!("Server stopped");
    }
}

impl Lifecycle for Server {
    fn is_running(&self) -> bool {
        self.state() == LifecycleState::Running
    }

    fn stop(&self) {
        Server::stop(self)
    }
}

fn join_unless_current(handle: JoinHandle<()>, what: &str) {
    if handle.thread().id() == thread::current().id() {
        return;
    }
    if handle.join().is_err() {
        error!(thread = what, "Thread panicked");
    }
}

fn backoff_after_accept_error(e: &io::Error) {
    warn!(error = %e, "Failed to accept connection");
    thread::sleep(ACCEPT_RETRY_DELAY);
}

/// Make a blocked `accept` return by connecting to the listener.
/// Returns whether the connection went through.
fn wake_acceptor(addr: SocketAddr) -> bool {
    let target = SocketAddr::new(wake_ip(addr.ip()), addr.port());
    match TcpStream::connect_timeout(&target, WAKE_TIMEOUT) {
        Ok(_) => {
            debug!(address = %target, "Woke accept thread");
            true
        }
        Err(e) => {
            warn!(address = %target, error = %e, "Wake-up connection failed");
            false
        }
    }
}

fn wake_ip(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V4(v4) if v4.is_unspecified() => IpAddr::V4(Ipv4Addr::LOCALHOST),
        IpAddr::V6(v6) if v6.is_unspecified() => IpAddr::V6(Ipv6Addr::LOCALHOST),
        other => other,
    }
}

/// Create a blocking TCP listener with SO_REUSEADDR.
fn create_listener(addr: SocketAddr) -> io::Result<TcpListener> {
    let socket = socket2::Socket::new(
        match addr {
            SocketAddr::V4(_) => socket2::Domain::IPV4,
            SocketAddr::V6(_) => socket2::Domain::IPV6,
        },
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;

    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    socket.listen(LISTEN_BACKLOG)?;

    Ok(socket.into())
}
