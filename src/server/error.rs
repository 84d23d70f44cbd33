//! Errors raised by [`Server`](super::Server) operations.

use std::io;

use thiserror::Error;

/// Errors that may occur while starting the server.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ServerError {
    /// Binding or configuring the listener failed.
    #[error("bind error: {0}")]
    Bind(#[source] io::Error),
}
