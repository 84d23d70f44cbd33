//! Tests for server runtime behaviour.

use std::{
    io,
    net::{Ipv4Addr, SocketAddr},
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use rstest::rstest;
use tokio::{
    io::AsyncReadExt,
    net::TcpStream,
    sync::oneshot,
    time::{Duration, Instant, timeout},
};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use super::{
    AcceptLoop,
    BackoffConfig,
    accept::{AcceptListener, accept_iteration},
};
use crate::{
    config::ServerConfig,
    connection::ConnectionSettings,
    dispatch::{DispatchConfig, Dispatcher},
    hooks::LifecycleHooks,
    manager::ConnectionManager,
    router::Routes,
    server::{
        Server,
        connection::ConnectionContext,
        test_util::{bind_echo_server, free_listener},
    },
};

const WAIT: Duration = Duration::from_secs(5);

#[derive(Default)]
struct FailingListener {
    calls: AtomicUsize,
}

#[async_trait]
impl AcceptListener for FailingListener {
    async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(io::Error::other("accept failed"))
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        Ok(SocketAddr::from((Ipv4Addr::LOCALHOST, 0)))
    }
}

fn context() -> ConnectionContext {
    ConnectionContext {
        settings: ConnectionSettings::default(),
        dispatcher: Dispatcher::start(
            Arc::new(Routes::default()),
            DispatchConfig {
                workers: 0,
                ..DispatchConfig::default()
            },
        ),
        manager: Arc::new(ConnectionManager::new()),
        hooks: LifecycleHooks::default(),
        tracker: TaskTracker::new(),
    }
}

#[rstest]
#[case(Duration::from_millis(10), Duration::from_millis(20))]
#[case(Duration::from_millis(700), Duration::from_secs(1))]
#[tokio::test(start_paused = true)]
async fn accept_failure_sleeps_then_backs_off(#[case] delay: Duration, #[case] next: Duration) {
    let ctx = context();
    let shutdown = CancellationToken::new();
    let state = AcceptLoop {
        ctx: &ctx,
        shutdown: &shutdown,
        backoff: BackoffConfig::default(),
        max_conn: 1,
    };
    let listener = FailingListener::default();

    let start = Instant::now();
    let result = accept_iteration(&listener, &state, &state.backoff, delay).await;
    assert_eq!(result, Some(next));
    assert!(start.elapsed() >= delay);
    assert_eq!(listener.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn cancelled_shutdown_stops_before_accepting() {
    let ctx = context();
    let shutdown = CancellationToken::new();
    shutdown.cancel();
    let state = AcceptLoop {
        ctx: &ctx,
        shutdown: &shutdown,
        backoff: BackoffConfig::default(),
        max_conn: 1,
    };
    let listener = FailingListener::default();

    let result = accept_iteration(&listener, &state, &state.backoff, Duration::from_millis(10)).await;
    assert_eq!(result, None);
    assert_eq!(listener.calls.load(Ordering::SeqCst), 0);
}

#[rstest]
#[tokio::test]
async fn run_with_shutdown_returns_and_signals_ready(free_listener: std::net::TcpListener) {
    let (ready_tx, ready_rx) = oneshot::channel();
    let server = bind_echo_server(free_listener).ready_signal(ready_tx);
    let handle = server.handle();
    let (tx, rx) = oneshot::channel::<()>();
    let run = tokio::spawn(server.run_with_shutdown(async {
        let _ = rx.await;
    }));

    timeout(WAIT, ready_rx)
        .await
        .expect("ready in time")
        .expect("ready sent");
    let _ = tx.send(());
    timeout(WAIT, run)
        .await
        .expect("server stops in time")
        .expect("join")
        .expect("server run failed");
    timeout(WAIT, handle.stopped()).await.expect("stopped resolves");
}

#[rstest]
#[tokio::test]
async fn handle_stop_closes_live_connections(free_listener: std::net::TcpListener) {
    let addr = free_listener.local_addr().expect("addr");
    let server = bind_echo_server(free_listener);
    let handle = server.handle();
    let run = tokio::spawn(server.run_with_shutdown(std::future::pending()));

    let mut client = TcpStream::connect(addr).await.expect("connect");
    let connections = handle.connections();
    timeout(WAIT, async {
        while connections.is_empty() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("connection registered");

    handle.stop();
    timeout(WAIT, run)
        .await
        .expect("server stops in time")
        .expect("join")
        .expect("server run failed");
    assert!(connections.is_empty());

    let mut buf = [0_u8; 1];
    let n = timeout(WAIT, client.read(&mut buf))
        .await
        .expect("read in time")
        .expect("read");
    assert_eq!(n, 0, "server closed the socket");
}

#[rstest]
#[tokio::test]
async fn sockets_beyond_max_conn_are_refused(free_listener: std::net::TcpListener) {
    let addr = free_listener.local_addr().expect("addr");
    let server = Server::with_config(
        "tiny",
        ServerConfig {
            max_conn: 1,
            ..ServerConfig::default()
        },
    )
    .bind_listener(free_listener)
    .expect("bind");
    let handle = server.handle();
    let run = tokio::spawn(server.run_with_shutdown(std::future::pending()));

    let _first = TcpStream::connect(addr).await.expect("connect first");
    let connections = handle.connections();
    timeout(WAIT, async {
        while connections.len() < 1 {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("first registered");

    let mut second = TcpStream::connect(addr).await.expect("connect second");
    let mut buf = [0_u8; 1];
    let n = timeout(WAIT, second.read(&mut buf))
        .await
        .expect("refusal in time")
        .unwrap_or(0);
    assert_eq!(n, 0, "refused socket is closed");
    assert_eq!(connections.len(), 1);

    handle.stop();
    timeout(WAIT, run)
        .await
        .expect("server stops in time")
        .expect("join")
        .expect("server run failed");
}
