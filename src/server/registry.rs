//! Registry of live sessions keyed by client address.
//!
//! Holds non-owning handles used only to enumerate and force-close
//! connections during shutdown. The lock covers map mutation only; callers
//! perform socket I/O on the handles after the lock is released.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Mutex, MutexGuard, PoisonError};

pub struct ConnectionRegistry<C> {
    connections: Mutex<HashMap<SocketAddr, C>>,
}

impl<C> Default for ConnectionRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> ConnectionRegistry<C> {
    pub fn new() -> Self {
        Self {
            connections: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SocketAddr, C>> {
        self.connections.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a connection. Returns the handle it displaced, if any.
    pub fn insert(&self, addr: SocketAddr, conn: C) -> Option<C> {
        self.lock().insert(addr, conn)
    }

    /// Deregister a connection. Removing a missing address is a no-op.
    pub fn remove(&self, addr: &SocketAddr) -> Option<C> {
        self.lock().remove(addr)
    }

    pub fn contains(&self, addr: &SocketAddr) -> bool {
        self.lock().contains_key(addr)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl<C: Clone> ConnectionRegistry<C> {
    /// Copy out every `(address, handle)` pair.
    pub fn snapshot(&self) -> Vec<(SocketAddr, C)> {
        self.lock()
            .iter()
            .map(|(addr, conn)| (*addr, conn.clone()))
            .collect()
    }
}
