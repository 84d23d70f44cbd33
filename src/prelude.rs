//! Optional convenience imports for writing routers and servers.
//!
//! Kept to the types almost every server touches. Import specialised APIs
//! from their owning modules.
//!
//! # Examples
//!
//! ```rust,no_run
//! use wirework::prelude::*;
//!
//! struct Ping;
//!
//! #[async_trait]
//! impl Router for Ping {
//!     async fn handle(&self, request: &Request) {
//!         let _ = request.connection().send_msg(1, "pong");
//!     }
//! }
//!
//! fn build() -> Result<Server, RouteError> { Server::new("ping").add_router(0, Ping) }
//! ```

pub use async_trait::async_trait;

pub use crate::{
    config::ServerConfig,
    connection::{Connection, ConnectionId, SendError},
    message::Message,
    request::Request,
    router::{RouteError, Router, handler},
    server::{Server, ServerError, ServerHandle},
};
