//! Connection spawning for [`Server`](super::Server).

use std::{net::SocketAddr, panic::AssertUnwindSafe, sync::Arc};

use futures::FutureExt;
use log::{error, warn};
use tokio::net::TcpStream;
use tokio_util::task::TaskTracker;

use crate::{
    connection::{Connection, ConnectionId, ConnectionSettings, ConnectionTask},
    dispatch::Dispatcher,
    fault::format_panic,
    hooks::LifecycleHooks,
    manager::ConnectionManager,
};

/// Shared state every accepted socket is wired into.
pub(super) struct ConnectionContext {
    pub settings: ConnectionSettings,
    pub dispatcher: Dispatcher,
    pub manager: Arc<ConnectionManager>,
    pub hooks: LifecycleHooks,
    pub tracker: TaskTracker,
}

/// Register a connection and spawn its task, logging and discarding any
/// panic.
pub(super) fn spawn_connection_task(
    ctx: &ConnectionContext,
    id: ConnectionId,
    stream: TcpStream,
    peer_addr: SocketAddr,
) {
    if let Err(e) = stream.set_nodelay(true) {
        warn!("failed to set TCP_NODELAY: error={e}, peer_addr={peer_addr}");
    }
    let (conn, outbound) = Connection::new(id, Some(peer_addr), ctx.settings);
    if let Err(e) = ctx.manager.add(conn.clone()) {
        error!("connection not registered: error={e}, peer_addr={peer_addr}");
        return;
    }
    let manager = Arc::clone(&ctx.manager);
    let task = ConnectionTask::new(
        conn,
        outbound,
        ctx.settings,
        ctx.dispatcher.clone(),
        Arc::clone(&ctx.manager),
        ctx.hooks.clone(),
    );
    ctx.tracker.spawn(async move {
        if let Err(panic) = AssertUnwindSafe(task.run(stream)).catch_unwind().await {
            manager.remove(id);
            crate::metrics::inc_errors();
            let panic_msg = format_panic(panic.as_ref());
            // Emit via both `log` and `tracing` for tests that capture either.
            error!("connection task panicked: panic={panic_msg}, conn_id={id}, peer_addr={peer_addr}");
            tracing::error!(panic = %panic_msg, conn_id = %id, %peer_addr, "connection task panicked");
        }
    });
}
