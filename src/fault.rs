//! Faults raised by router hooks.
//!
//! A panic inside a hook is caught at the worker boundary and turned into a
//! [`HandlerFault`], which is logged and counted but never propagated: the
//! faulting request is abandoned and the worker moves on.

use std::{any::Any, fmt};

use thiserror::Error;

use crate::connection::ConnectionId;

/// Stage of the router pipeline that faulted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HookStage {
    /// [`crate::router::Router::pre_handle`].
    PreHandle,
    /// [`crate::router::Router::handle`].
    Handle,
    /// [`crate::router::Router::post_handle`].
    PostHandle,
}

impl fmt::Display for HookStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::PreHandle => "pre_handle",
            Self::Handle => "handle",
            Self::PostHandle => "post_handle",
        })
    }
}

/// A hook panicked while handling a request.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("{stage} panicked for msg_id={msg_id} on {conn_id}: {message}")]
pub struct HandlerFault {
    /// Connection the request arrived on.
    pub conn_id: ConnectionId,
    /// Message identifier being handled.
    pub msg_id: u32,
    /// Hook that panicked.
    pub stage: HookStage,
    /// Rendered panic payload.
    pub message: String,
}

impl HandlerFault {
    /// Build a fault from a caught panic payload.
    #[must_use]
    pub fn from_panic(
        conn_id: ConnectionId,
        msg_id: u32,
        stage: HookStage,
        payload: &(dyn Any + Send),
    ) -> Self {
        Self {
            conn_id,
            msg_id,
            stage,
            message: format_panic(payload).to_string(),
        }
    }
}

/// Wrapper that renders a panic payload for logs.
///
/// `String` and `&'static str` payloads are shown verbatim; anything else
/// falls back to `Debug` formatting.
///
/// ```
/// use wirework::fault::format_panic;
/// let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
/// assert_eq!(format_panic(payload.as_ref()).to_string(), "boom");
/// let payload: Box<dyn std::any::Any + Send> = Box::new(7_u8);
/// assert!(format_panic(payload.as_ref()).to_string().contains("Any"));
/// ```
#[must_use]
pub struct PanicMessage<'a>(&'a (dyn Any + Send));

impl fmt::Display for PanicMessage<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(s) = self.0.downcast_ref::<String>() {
            f.write_str(s)
        } else if let Some(s) = self.0.downcast_ref::<&'static str>() {
            f.write_str(s)
        } else {
            write!(f, "{:?}", self.0)
        }
    }
}

/// Borrow a panic payload for display.
pub fn format_panic(payload: &(dyn Any + Send)) -> PanicMessage<'_> { PanicMessage(payload) }
