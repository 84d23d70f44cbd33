//! Runtime control for [`Server`].

mod accept;
mod backoff;
#[cfg(test)]
mod tests;

use std::sync::Arc;

use accept::{AcceptLoop, accept_loop};
pub use backoff::BackoffConfig;
use futures::Future;
use log::{info, warn};
use tokio::{select, signal};
use tokio_util::task::TaskTracker;

use super::{Bound, Server, ServerError, connection::ConnectionContext};
use crate::dispatch::Dispatcher;

impl Server<Bound> {
    /// Run the server until Ctrl-C is received or [`super::ServerHandle::stop`]
    /// is called.
    ///
    /// # Errors
    ///
    /// Accept failures are retried with exponential back-off and do not
    /// surface as errors; the `Result` is kept for start-up failures.
    pub async fn serve(self) -> Result<(), ServerError> {
        self.run_with_shutdown(async {
            let _ = signal::ctrl_c().await;
        })
        .await
    }

    /// Run the server until `shutdown` resolves or
    /// [`super::ServerHandle::stop`] is called.
    ///
    /// Shutdown proceeds in order: stop accepting, stop every connection,
    /// wait for their tasks (and stop hooks) to finish, shut the worker pool
    /// down, release the listener.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::net::{Ipv4Addr, SocketAddr};
    ///
    /// use tokio::sync::oneshot;
    /// use wirework::server::Server;
    ///
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), wirework::server::ServerError> {
    /// let server = Server::new("demo").bind(SocketAddr::from((Ipv4Addr::LOCALHOST, 0)))?;
    ///
    /// let (tx, rx) = oneshot::channel::<()>();
    /// let handle = tokio::spawn(server.run_with_shutdown(async {
    ///     let _ = rx.await;
    /// }));
    ///
    /// let _ = tx.send(());
    /// handle
    ///     .await
    ///     .expect("join server task")
    ///     .expect("server run failed");
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// Accept failures are retried with exponential back-off and do not
    /// surface as errors.
    #[expect(
        clippy::integer_division_remainder_used,
        reason = "tokio::select! expands to modulus internally"
    )]
    pub async fn run_with_shutdown<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send,
    {
        let Server {
            config,
            routes,
            hooks,
            ready_tx,
            backoff,
            control,
            state: Bound { listener },
        } = self;

        let dispatcher = Dispatcher::start(Arc::new(routes), config.dispatch_config());
        let ctx = ConnectionContext {
            settings: config.connection_settings(),
            dispatcher: dispatcher.clone(),
            manager: Arc::clone(control.manager()),
            hooks,
            tracker: TaskTracker::new(),
        };
        let accept = AcceptLoop {
            ctx: &ctx,
            shutdown: control.shutdown_token(),
            backoff,
            max_conn: config.max_conn,
        };
        info!(
            "server started: name={}, addr={:?}, workers={}, max_conn={}, max_packet_size={}",
            config.name,
            listener.local_addr().ok(),
            dispatcher.worker_count(),
            config.max_conn,
            config.max_packet_size,
        );

        if let Some(tx) = ready_tx
            && tx.send(()).is_err()
        {
            warn!("failed to send readiness signal: receiver dropped");
        }

        select! {
            () = shutdown => control.stop(),
            () = accept_loop(listener.as_ref(), &accept) => {},
        }

        info!("server stopping: name={}, live={}", config.name, ctx.manager.len());
        ctx.manager.clear_all();
        ctx.tracker.close();
        ctx.tracker.wait().await;
        dispatcher.shutdown().await;
        drop(listener);
        control.mark_stopped();
        info!("server stopped: name={}", config.name);
        Ok(())
    }
}
