//! Builder methods shared by bound and unbound servers.

use std::{future::Future, sync::Arc};

use tokio::sync::oneshot;

use super::{BackoffConfig, Server, ServerHandle, ServerState, Unbound};
use crate::{
    config::ServerConfig,
    connection::Connection,
    hooks::{LifecycleHooks, connection_hook},
    router::{RouteError, Router, Routes},
};

impl Server<Unbound> {
    /// Create a server named `name` with default configuration.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(name, ServerConfig::default())
    }

    /// Create a server named `name` with explicit configuration.
    ///
    /// The configuration is normalised first.
    #[must_use]
    pub fn with_config(name: impl Into<String>, config: ServerConfig) -> Self {
        let mut config = config.normalized();
        config.name = name.into();
        Self {
            config,
            routes: Routes::default(),
            hooks: LifecycleHooks::default(),
            ready_tx: None,
            backoff: BackoffConfig::default(),
            control: ServerHandle::new(),
            state: Unbound,
        }
    }
}

impl<S: ServerState> Server<S> {
    /// Bind `router` to message identifier `id`.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError::DuplicateRoute`] if `id` already has a router.
    pub fn add_router<R>(mut self, id: u32, router: R) -> Result<Self, RouteError>
    where
        R: Router,
    {
        self.routes.add(id, Arc::new(router))?;
        Ok(self)
    }

    /// Run `f` for every connection after it is registered and before its
    /// first request is read.
    #[must_use]
    pub fn on_conn_start<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Connection) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.hooks = self.hooks.with_start(connection_hook(f));
        self
    }

    /// Run `f` exactly once for every connection after its socket closes.
    #[must_use]
    pub fn on_conn_stop<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Connection) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.hooks = self.hooks.with_stop(connection_hook(f));
        self
    }

    /// Signal `tx` once the worker pool is up and the server is accepting.
    ///
    /// A `oneshot::Sender` carries a single notification, so a fresh sender
    /// is needed for every run.
    #[must_use]
    pub fn ready_signal(mut self, tx: oneshot::Sender<()>) -> Self {
        self.ready_tx = Some(tx);
        self
    }

    /// Override the accept-error back-off.
    #[must_use]
    pub fn accept_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff.normalized();
        self
    }

    /// Server name.
    #[must_use]
    pub fn name(&self) -> &str { &self.config.name }

    /// Effective configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig { &self.config }

    /// Registered routes.
    #[must_use]
    pub fn routes(&self) -> &Routes { &self.routes }

    /// Control handle for stopping the server and reaching its connections.
    #[must_use]
    pub fn handle(&self) -> ServerHandle { self.control.clone() }
}
