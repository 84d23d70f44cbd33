//! Utilities for testing `wirework` servers over real sockets.
//!
//! [`TestServer`] runs a [`Server`](wirework::server::Server) on an
//! ephemeral port, [`FrameClient`] speaks the wire protocol to it, and the
//! [`logger`] fixture captures `log` records.
//!
//! ```rust,no_run
//! use wirework_testing::{FrameClient, TestServer, echo_server};
//!
//! # async fn example() {
//! let server = TestServer::spawn(echo_server(1)).await;
//! let mut client = FrameClient::connect(server.addr()).await.expect("connect");
//! let reply = client.request(1, "ping").await.expect("reply");
//! assert_eq!(reply.data().as_ref(), b"ping");
//! server.shutdown().await;
//! # }
//! ```

pub mod client;
pub mod logging;
pub mod server;

pub use client::{ClientError, FrameClient};
pub use logging::{LoggerHandle, logger};
pub use server::{TestServer, echo_server};
