//! Spawning servers on ephemeral ports.

use std::{
    net::{Ipv4Addr, SocketAddr, TcpListener as StdTcpListener},
    sync::Arc,
    time::Duration,
};

use tokio::{sync::oneshot, task::JoinHandle, time::timeout};
use wirework::{
    manager::ConnectionManager,
    request::Request,
    router::handler,
    server::{Server, ServerError, ServerHandle},
};

const STARTUP_TIMEOUT: Duration = Duration::from_secs(5);

/// A server running on a background task.
///
/// Dropping it requests shutdown without waiting; call
/// [`TestServer::shutdown`] to wait for teardown.
pub struct TestServer {
    addr: SocketAddr,
    handle: ServerHandle,
    task: Option<JoinHandle<Result<(), ServerError>>>,
}

impl TestServer {
    /// Bind `server` to `127.0.0.1:0`, run it, and wait until it is accepting.
    ///
    /// # Panics
    ///
    /// Panics if binding fails or the server does not signal readiness.
    pub async fn spawn(server: Server) -> Self {
        let listener = StdTcpListener::bind(SocketAddr::from((Ipv4Addr::LOCALHOST, 0)))
            .expect("bind ephemeral port");
        let addr = listener.local_addr().expect("listener address");
        let (ready_tx, ready_rx) = oneshot::channel();
        let server = server
            .ready_signal(ready_tx)
            .bind_listener(listener)
            .expect("adopt listener");
        let handle = server.handle();
        let task = tokio::spawn(server.run_with_shutdown(std::future::pending()));
        timeout(STARTUP_TIMEOUT, ready_rx)
            .await
            .expect("server ready in time")
            .expect("server signalled readiness");
        Self {
            addr,
            handle,
            task: Some(task),
        }
    }

    /// Address the server accepts on.
    #[must_use]
    pub fn addr(&self) -> SocketAddr { self.addr }

    /// Control handle of the running server.
    #[must_use]
    pub fn handle(&self) -> &ServerHandle { &self.handle }

    /// Registry of live connections.
    #[must_use]
    pub fn connections(&self) -> Arc<ConnectionManager> { self.handle.connections() }

    /// Poll until `len` connections are registered.
    ///
    /// # Panics
    ///
    /// Panics if the count is not reached within the startup timeout.
    pub async fn wait_for_connections(&self, len: usize) {
        let connections = self.connections();
        timeout(STARTUP_TIMEOUT, async {
            while connections.len() != len {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("connection count reached in time");
    }

    /// Stop the server and wait for it to finish.
    ///
    /// # Panics
    ///
    /// Panics if the server task fails or does not stop in time.
    pub async fn shutdown(mut self) {
        self.handle.stop();
        if let Some(task) = self.task.take() {
            timeout(STARTUP_TIMEOUT, task)
                .await
                .expect("server stopped in time")
                .expect("server task join")
                .expect("server run");
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) { self.handle.stop(); }
}

/// Server with an echo router on message id `id`.
///
/// # Panics
///
/// Panics only if `id` were already bound, which cannot happen on a fresh
/// server.
#[must_use]
pub fn echo_server(id: u32) -> Server {
    Server::new("echo")
        .add_router(
            id,
            handler(|req: Request| async move {
                let _ = req
                    .connection()
                    .send_msg_wait(req.msg_id(), req.data().clone())
                    .await;
            }),
        )
        .expect("fresh server has no routes")
}
