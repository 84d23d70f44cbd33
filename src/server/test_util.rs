//! Test helpers shared across server modules.

use std::net::{Ipv4Addr, SocketAddr, TcpListener as StdTcpListener};

use rstest::fixture;

use super::{Bound, Server};
use crate::{request::Request, router::handler};

#[fixture]
/// Returns a bound [`StdTcpListener`] on a free port for use in tests.
///
/// Keeping the listener bound prevents races where another process could
/// claim the port between discovery and use.
pub fn free_listener() -> StdTcpListener {
    let addr = SocketAddr::new(Ipv4Addr::LOCALHOST.into(), 0);
    StdTcpListener::bind(addr).expect("Failed to bind free port listener")
}

/// Bind an echo server on message id 1 to `listener`.
pub fn bind_echo_server(listener: StdTcpListener) -> Server<Bound> {
    Server::new("test")
        .add_router(
            1,
            handler(|req: Request| async move {
                let _ = req
                    .connection()
                    .send_msg(req.msg_id(), req.data().clone());
            }),
        )
        .expect("register echo")
        .bind_listener(listener)
        .expect("Failed to bind")
}
