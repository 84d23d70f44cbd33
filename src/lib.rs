#![doc(html_root_url = "https://docs.rs/wirework/latest")]
//! Public API for the `wirework` library.
//!
//! `wirework` is a small framework for TCP application servers speaking a
//! length-prefixed binary protocol. Each frame carries a message identifier
//! that selects a [`Router`](router::Router); requests run on a bounded
//! worker pool sharded by connection so each connection's requests are
//! handled in arrival order while different connections proceed in
//! parallel.

pub mod byte_order;
pub mod codec;
pub mod config;
pub mod connection;
pub mod dispatch;
pub mod fault;
pub mod hooks;
pub mod manager;
pub mod message;
pub mod metrics;
pub mod prelude;
pub mod request;
pub mod router;
pub mod server;

pub use codec::{DataPack, HEAD_LEN, MessageCodec};
pub use connection::{Connection, ConnectionId, SendError};
pub use message::Message;
pub use metrics::{CONNECTIONS_ACTIVE, Direction, ERRORS_TOTAL, FRAMES_PROCESSED};
pub use request::Request;
pub use router::{Router, handler};
pub use server::{Server, ServerError, ServerHandle};
