//! Connection lifecycle callbacks.
//!
//! [`LifecycleHooks`] stores the optional start and stop callbacks registered
//! on the server. The start hook runs after a connection is registered and
//! before its pumps begin reading; the stop hook runs exactly once after both
//! pumps have exited and the socket is closed.

use std::{future::Future, panic::AssertUnwindSafe, sync::Arc};

use futures::{FutureExt, future::BoxFuture};
use log::error;

use crate::{connection::Connection, fault::format_panic};

/// Type-erased lifecycle callback.
pub type ConnectionHook = Arc<dyn Fn(Connection) -> BoxFuture<'static, ()> + Send + Sync>;

/// Box an async closure as a [`ConnectionHook`].
pub fn connection_hook<F, Fut>(f: F) -> ConnectionHook
where
    F: Fn(Connection) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(move |conn| f(conn).boxed())
}

/// Optional start and stop callbacks shared by every connection.
#[derive(Clone, Default)]
pub struct LifecycleHooks {
    on_start: Option<ConnectionHook>,
    on_stop: Option<ConnectionHook>,
}

impl LifecycleHooks {
    /// Replace the start callback.
    #[must_use]
    pub fn with_start(mut self, hook: ConnectionHook) -> Self {
        self.on_start = Some(hook);
        self
    }

    /// Replace the stop callback.
    #[must_use]
    pub fn with_stop(mut self, hook: ConnectionHook) -> Self {
        self.on_stop = Some(hook);
        self
    }

    /// Whether a start callback is registered.
    #[must_use]
    pub fn has_start(&self) -> bool { self.on_start.is_some() }

    /// Whether a stop callback is registered.
    #[must_use]
    pub fn has_stop(&self) -> bool { self.on_stop.is_some() }

    pub(crate) async fn run_start(&self, conn: &Connection) {
        run_hook("start", self.on_start.as_ref(), conn).await;
    }

    pub(crate) async fn run_stop(&self, conn: &Connection) {
        run_hook("stop", self.on_stop.as_ref(), conn).await;
    }
}

impl std::fmt::Debug for LifecycleHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleHooks")
            .field("on_start", &self.has_start())
            .field("on_stop", &self.has_stop())
            .finish()
    }
}

/// Run a callback, logging and discarding any panic.
async fn run_hook(kind: &str, hook: Option<&ConnectionHook>, conn: &Connection) {
    let Some(hook) = hook else { return };
    let id = conn.id();
    if let Err(panic) = AssertUnwindSafe(hook(conn.clone())).catch_unwind().await {
        crate::metrics::inc_handler_faults();
        let panic_msg = format_panic(panic.as_ref());
        error!("{kind} hook panicked: conn_id={id}, panic={panic_msg}");
        tracing::error!(hook = kind, conn_id = %id, panic = %panic_msg, "lifecycle hook panicked");
    }
}
