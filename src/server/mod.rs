//! Tokio-based TCP server.
//!
//! [`Server`] owns the listening socket and the accept loop. Each accepted
//! socket becomes a [`Connection`](crate::connection::Connection) registered
//! with the shared [`ConnectionManager`], driven by its own reader and writer
//! pumps, and dispatched to the worker pool by connection identity.

use std::sync::Arc;

use tokio::{net::TcpListener, sync::oneshot};
use tokio_util::sync::CancellationToken;

use crate::{
    config::ServerConfig,
    hooks::LifecycleHooks,
    manager::ConnectionManager,
    router::Routes,
};

mod binding;
mod builder;
mod connection;
pub mod error;
mod runtime;

pub use error::ServerError;
pub use runtime::BackoffConfig;

#[cfg(test)]
pub(crate) mod test_util;

/// TCP application server.
///
/// The server carries a typestate `S` indicating whether it is [`Unbound`]
/// or [`Bound`]. Routes and hooks are configured while unbound or bound;
/// only a bound server can run.
///
/// # Examples
///
/// ```no_run
/// use wirework::{request::Request, router::handler, server::Server};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// Server::new("echo")
///     .add_router(
///         1,
///         handler(|req: Request| async move {
///             let _ = req.connection().send_msg(req.msg_id(), req.data().clone());
///         }),
///     )?
///     .bind(([127, 0, 0, 1], 8999).into())?
///     .serve()
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct Server<S: ServerState = Unbound> {
    pub(crate) config: ServerConfig,
    pub(crate) routes: Routes,
    pub(crate) hooks: LifecycleHooks,
    pub(crate) ready_tx: Option<oneshot::Sender<()>>,
    pub(crate) backoff: BackoffConfig,
    pub(crate) control: ServerHandle,
    pub(crate) state: S,
}

/// Marker indicating the server has not yet bound a listener.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unbound;

/// Marker indicating the server is bound to a TCP listener.
#[derive(Debug, Clone)]
pub struct Bound {
    pub(crate) listener: Arc<TcpListener>,
}

/// Trait implemented by [`Unbound`] and [`Bound`] to model binding typestate.
pub trait ServerState: sealed::Sealed {}

mod sealed {
    //! Prevent external implementations of [`ServerState`].

    pub trait Sealed {}
    impl Sealed for super::Unbound {}
    impl Sealed for super::Bound {}
}

impl ServerState for Unbound {}
impl ServerState for Bound {}

/// Cloneable control handle for a running server.
///
/// Obtained from [`Server::handle`] before the server is started.
#[derive(Clone, Debug)]
pub struct ServerHandle {
    shutdown: CancellationToken,
    stopped: CancellationToken,
    manager: Arc<ConnectionManager>,
}

impl ServerHandle {
    pub(crate) fn new() -> Self {
        Self {
            shutdown: CancellationToken::new(),
            stopped: CancellationToken::new(),
            manager: Arc::new(ConnectionManager::new()),
        }
    }

    /// Ask the server to stop. Idempotent.
    ///
    /// The server stops accepting, stops every connection, waits for their
    /// stop hooks and shuts the worker pool down.
    pub fn stop(&self) { self.shutdown.cancel(); }

    /// Whether [`ServerHandle::stop`] has been requested.
    #[must_use]
    pub fn is_stopping(&self) -> bool { self.shutdown.is_cancelled() }

    /// Registry of live connections.
    #[must_use]
    pub fn connections(&self) -> Arc<ConnectionManager> { Arc::clone(&self.manager) }

    /// Resolve once the server has finished shutting down.
    ///
    /// Never resolves for a server that is never run.
    pub async fn stopped(&self) { self.stopped.cancelled().await; }

    pub(crate) fn shutdown_token(&self) -> &CancellationToken { &self.shutdown }

    pub(crate) fn mark_stopped(&self) { self.stopped.cancel(); }

    pub(crate) fn manager(&self) -> &Arc<ConnectionManager> { &self.manager }
}

#[cfg(test)]
mod tests;
