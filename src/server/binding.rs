//! Listener binding for [`Server`].

use std::{
    net::{SocketAddr, TcpListener as StdTcpListener},
    sync::Arc,
};

use tokio::net::TcpListener;

use super::{Bound, Server, ServerError, ServerState, Unbound};

impl<S: ServerState> Server<S> {
    fn bind_to_listener(self, std_listener: StdTcpListener) -> Result<Server<Bound>, ServerError> {
        let Server {
            config,
            routes,
            hooks,
            ready_tx,
            backoff,
            control,
            ..
        } = self;

        std_listener
            .set_nonblocking(true)
            .map_err(ServerError::Bind)?;
        let listener = TcpListener::from_std(std_listener).map_err(ServerError::Bind)?;

        Ok(Server {
            config,
            routes,
            hooks,
            ready_tx,
            backoff,
            control,
            state: Bound {
                listener: Arc::new(listener),
            },
        })
    }
}

impl Server<Unbound> {
    /// Return `None` as the server is not bound.
    ///
    /// ```
    /// use wirework::server::Server;
    ///
    /// assert!(Server::new("demo").local_addr().is_none());
    /// ```
    #[must_use]
    pub const fn local_addr(&self) -> Option<SocketAddr> { None }

    /// Bind to `addr`. Must be called within a Tokio runtime.
    ///
    /// ```
    /// use std::net::{Ipv4Addr, SocketAddr};
    ///
    /// use wirework::server::Server;
    ///
    /// # #[tokio::main]
    /// # async fn main() {
    /// let server = Server::new("demo")
    ///     .bind(SocketAddr::from((Ipv4Addr::LOCALHOST, 0)))
    ///     .expect("bind failed");
    /// assert!(server.local_addr().is_some());
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if binding or configuring the listener
    /// fails.
    pub fn bind(self, addr: SocketAddr) -> Result<Server<Bound>, ServerError> {
        let std_listener = StdTcpListener::bind(addr).map_err(ServerError::Bind)?;
        self.bind_to_listener(std_listener)
    }

    /// Bind to the configured `host:port`.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the address does not resolve or
    /// cannot be bound.
    pub fn bind_configured(self) -> Result<Server<Bound>, ServerError> {
        let std_listener =
            StdTcpListener::bind(self.config.bind_addr()).map_err(ServerError::Bind)?;
        self.bind_to_listener(std_listener)
    }

    /// Adopt an existing standard-library listener.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the listener cannot be made
    /// non-blocking or registered with the runtime.
    pub fn bind_listener(self, std_listener: StdTcpListener) -> Result<Server<Bound>, ServerError> {
        self.bind_to_listener(std_listener)
    }
}

impl Server<Bound> {
    /// Returns the bound address, or `None` if retrieving it fails.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> { self.state.listener.local_addr().ok() }
}
