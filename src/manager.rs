//! Registry of live connections.
//!
//! [`ConnectionManager`] maps [`ConnectionId`]s to [`Connection`] handles so
//! handlers and the server can look up, enumerate and stop connections. The
//! server registers a connection before its start hook runs and removes it
//! after the stop hook has fired.

use dashmap::{DashMap, mapref::entry::Entry};
use log::debug;
use thiserror::Error;

use crate::connection::{Connection, ConnectionId};

/// Errors returned by [`ConnectionManager`].
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum ManagerError {
    /// A connection with the same identifier is already registered.
    #[error("{0} is already registered")]
    Duplicate(ConnectionId),
    /// No connection is registered under the identifier.
    #[error("{0} not found")]
    NotFound(ConnectionId),
}

/// Concurrent registry of live connections keyed by [`ConnectionId`].
///
/// `DashMap` shards its locks, so mutations and iteration contend only
/// within a shard.
#[derive(Default)]
pub struct ConnectionManager(DashMap<ConnectionId, Connection>);

impl ConnectionManager {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Register a connection.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::Duplicate`] if the identifier is taken. The
    /// existing entry is left untouched.
    pub fn add(&self, conn: Connection) -> Result<(), ManagerError> {
        let id = conn.id();
        match self.0.entry(id) {
            Entry::Occupied(_) => Err(ManagerError::Duplicate(id)),
            Entry::Vacant(slot) => {
                slot.insert(conn);
                debug!("connection registered: id={id}, live={}", self.0.len());
                Ok(())
            }
        }
    }

    /// Unregister a connection, returning it if it was present.
    pub fn remove(&self, id: ConnectionId) -> Option<Connection> {
        self.0.remove(&id).map(|(_, conn)| conn)
    }

    /// Look up a live connection.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::NotFound`] if no connection has that identifier.
    pub fn get(&self, id: ConnectionId) -> Result<Connection, ManagerError> {
        self.0
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or(ManagerError::NotFound(id))
    }

    /// Number of registered connections.
    #[must_use]
    pub fn len(&self) -> usize { self.0.len() }

    /// Whether no connections are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    /// Identifiers of registered connections in ascending order.
    #[must_use]
    pub fn ids(&self) -> Vec<ConnectionId> {
        let mut ids: Vec<ConnectionId> = self.0.iter().map(|entry| *entry.key()).collect();
        ids.sort_unstable();
        ids
    }

    /// Stop every registered connection and empty the registry.
    ///
    /// Each shard is stopped and emptied under its write lock, so a
    /// connection added concurrently is either stopped here or stays
    /// registered. Stopping only signals the connections; their tasks finish
    /// tearing down and fire stop hooks asynchronously.
    pub fn clear_all(&self) {
        let mut stopped = 0_usize;
        self.0.retain(|_, conn| {
            conn.stop();
            stopped += 1;
            false
        });
        debug!("connection registry cleared: stopped={stopped}");
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("len", &self.len())
            .finish()
    }
}
