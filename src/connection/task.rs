//! Supervising task that owns one connection's socket.

use std::sync::Arc;

use log::{debug, info, warn};
use tokio::io::{AsyncRead, AsyncWrite};

use super::{Connection, ConnectionSettings, ConnectionState, OutboundFrames, reader, writer};
use crate::{dispatch::Dispatcher, hooks::LifecycleHooks, manager::ConnectionManager};

/// Stops the connection when a pump exits, including by panic.
pub(super) struct StopOnExit(Connection);

impl StopOnExit {
    pub(super) fn new(conn: Connection) -> Self { Self(conn) }
}

impl Drop for StopOnExit {
    fn drop(&mut self) { self.0.stop(); }
}

/// RAII guard keeping the live-connections gauge in step with the task.
struct LiveGauge;

impl LiveGauge {
    fn new() -> Self {
        crate::metrics::inc_connections();
        Self
    }
}

impl Drop for LiveGauge {
    fn drop(&mut self) { crate::metrics::dec_connections(); }
}

/// Everything a connection needs besides its socket.
pub(crate) struct ConnectionTask {
    conn: Connection,
    outbound: OutboundFrames,
    settings: ConnectionSettings,
    dispatcher: Dispatcher,
    manager: Arc<ConnectionManager>,
    hooks: LifecycleHooks,
}

impl ConnectionTask {
    pub(crate) fn new(
        conn: Connection,
        outbound: OutboundFrames,
        settings: ConnectionSettings,
        dispatcher: Dispatcher,
        manager: Arc<ConnectionManager>,
        hooks: LifecycleHooks,
    ) -> Self {
        Self {
            conn,
            outbound,
            settings,
            dispatcher,
            manager,
            hooks,
        }
    }

    /// Drive a registered connection to teardown.
    ///
    /// The caller registers the connection with the manager first. This runs
    /// the start hook, then the reader and writer pumps as separate tasks.
    /// Once both have exited the socket is dropped, the state becomes
    /// [`ConnectionState::Closed`], the stop hook runs and the registration
    /// is removed.
    pub(crate) async fn run<S>(self, stream: S)
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let Self {
            conn,
            outbound,
            settings,
            dispatcher,
            manager,
            hooks,
        } = self;
        let id = conn.id();
        let _live = LiveGauge::new();
        info!("connection opened: conn_id={id}, peer_addr={:?}", conn.peer_addr());

        hooks.run_start(&conn).await;
        conn.advance(ConnectionState::Running);

        let (read_half, write_half) = tokio::io::split(stream);
        let reader = tokio::spawn(reader::run(
            conn.clone(),
            read_half,
            dispatcher,
            settings.read_timeout,
        ));
        let writer = tokio::spawn(writer::run(
            conn.clone(),
            write_half,
            outbound,
            settings.write_timeout,
        ));
        let (read_half, write_half) = tokio::join!(reader, writer);
        match (read_half, write_half) {
            (Ok(r), Ok(w)) => drop(r.unsplit(w)),
            (r, w) => {
                for err in [r.err(), w.err()].into_iter().flatten() {
                    warn!("connection pump failed: error={err}, conn_id={id}");
                }
            }
        }

        conn.stop();
        conn.advance(ConnectionState::Closed);
        hooks.run_stop(&conn).await;
        manager.remove(id);
        info!("connection closed: conn_id={id}");
        debug!("live connections: count={}", manager.len());
    }
}
