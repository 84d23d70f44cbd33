//! Accept-loop utilities for server runtime.

use std::{io, net::SocketAddr};

use async_trait::async_trait;
use log::warn;
use tokio::{
    net::{TcpListener, TcpStream},
    select,
    time::{Duration, sleep},
};
use tokio_util::sync::CancellationToken;

use super::backoff::BackoffConfig;
use crate::{
    connection::ConnectionId,
    metrics,
    server::connection::{ConnectionContext, spawn_connection_task},
};

/// Abstraction for sources of incoming connections consumed by the accept loop.
///
/// Implementations must be cancellation-safe: dropping a pending `accept()`
/// future must not leak resources.
#[async_trait]
pub(in crate::server) trait AcceptListener: Send + Sync {
    async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)>;
    fn local_addr(&self) -> io::Result<SocketAddr>;
}

#[async_trait]
impl AcceptListener for TcpListener {
    async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)> {
        TcpListener::accept(self).await
    }

    fn local_addr(&self) -> io::Result<SocketAddr> { TcpListener::local_addr(self) }
}

/// State owned by one accept loop.
pub(in crate::server) struct AcceptLoop<'a> {
    pub ctx: &'a ConnectionContext,
    pub shutdown: &'a CancellationToken,
    pub backoff: BackoffConfig,
    pub max_conn: usize,
}

/// Accept connections until `shutdown` is cancelled.
///
/// Each accepted socket is assigned the next process-wide [`ConnectionId`]
/// and handed to a connection task tracked by the context's tracker. Sockets
/// arriving while `max_conn` connections are live are closed immediately. Accept failures
/// trigger an exponential back-off governed by `backoff`.
pub(in crate::server) async fn accept_loop<L>(listener: &L, state: &AcceptLoop<'_>)
where
    L: AcceptListener + ?Sized,
{
    let backoff = state.backoff.normalized();
    debug_assert!(
        backoff.initial_delay <= backoff.max_delay,
        "BackoffConfig invariant violated: initial_delay > max_delay"
    );
    let mut delay = backoff.initial_delay;
    while let Some(next_delay) = accept_iteration(listener, state, &backoff, delay).await {
        delay = next_delay;
    }
}

#[expect(
    clippy::integer_division_remainder_used,
    reason = "tokio::select! expands to modulus internally"
)]
pub(super) async fn accept_iteration<L>(
    listener: &L,
    state: &AcceptLoop<'_>,
    backoff: &BackoffConfig,
    delay: Duration,
) -> Option<Duration>
where
    L: AcceptListener + ?Sized,
{
    select! {
        biased;

        () = state.shutdown.cancelled() => None,
        res = listener.accept() => Some(match res {
            Ok((stream, peer_addr)) => {
                admit(state, stream, peer_addr);
                backoff.initial_delay
            }
            Err(e) => {
                let local_addr = listener.local_addr().ok();
                warn!("accept error: error={e:?}, local_addr={local_addr:?}");
                sleep(delay).await;
                backoff.next_delay(delay)
            }
        }),
    }
}

fn admit(state: &AcceptLoop<'_>, stream: TcpStream, peer_addr: SocketAddr) {
    let live = state.ctx.manager.len();
    if live >= state.max_conn {
        metrics::inc_connections_refused();
        warn!(
            "connection refused: live={live}, max_conn={}, peer_addr={peer_addr}",
            state.max_conn
        );
        drop(stream);
        return;
    }
    let id = ConnectionId::next();
    spawn_connection_task(state.ctx, id, stream, peer_addr);
}
