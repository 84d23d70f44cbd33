//! Router pipelines and the route table.
//!
//! A [`Router`] is bound to one message identifier and runs three hooks per
//! request: [`Router::pre_handle`], [`Router::handle`] and
//! [`Router::post_handle`]. Every hook defaults to a no-op, so implementors
//! override only what they need.
//!
//! Routes are collected in a [`Routes`] table before the server starts and
//! are frozen behind an `Arc` once serving begins.

use std::{collections::HashMap, fmt, future::Future, sync::Arc};

use async_trait::async_trait;
use thiserror::Error;

use crate::request::Request;

/// Errors raised while registering routes.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum RouteError {
    /// A router for the identifier is already registered.
    #[error("route id {0} was already registered")]
    DuplicateRoute(u32),
}

/// Hook set bound to a message identifier.
///
/// All three hooks share the request's connection and may call
/// [`crate::connection::Connection::send_msg`] any number of times.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use wirework::{request::Request, router::Router};
///
/// struct Ping;
///
/// #[async_trait]
/// impl Router for Ping {
///     async fn handle(&self, request: &Request) {
///         let _ = request.connection().send_msg(1, "pong");
///     }
/// }
/// ```
#[async_trait]
pub trait Router: Send + Sync + 'static {
    /// Runs before [`Router::handle`].
    async fn pre_handle(&self, _request: &Request) {}

    /// Main handler.
    async fn handle(&self, _request: &Request) {}

    /// Runs after [`Router::handle`].
    async fn post_handle(&self, _request: &Request) {}
}

/// Router whose `handle` hook is an async closure.
///
/// Built with [`handler`].
pub struct HandlerFn<F>(F);

/// Wrap an async closure as a [`Router`] with only a `handle` hook.
///
/// # Examples
///
/// ```
/// use wirework::{request::Request, router::handler};
///
/// let echo = handler(|req: Request| async move {
///     let _ = req.connection().send_msg(req.msg_id(), req.data().clone());
/// });
/// # let _ = echo;
/// ```
pub fn handler<F, Fut>(f: F) -> HandlerFn<F>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    HandlerFn(f)
}

#[async_trait]
impl<F, Fut> Router for HandlerFn<F>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    async fn handle(&self, request: &Request) { (self.0)(request.clone()).await; }
}

/// Table mapping message identifiers to routers.
#[derive(Clone, Default)]
pub struct Routes {
    table: HashMap<u32, Arc<dyn Router>>,
}

impl Routes {
    /// Bind `router` to `id`.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError::DuplicateRoute`] if `id` is already bound. The
    /// existing binding is left untouched.
    pub fn add(&mut self, id: u32, router: Arc<dyn Router>) -> Result<(), RouteError> {
        if self.table.contains_key(&id) {
            return Err(RouteError::DuplicateRoute(id));
        }
        self.table.insert(id, router);
        Ok(())
    }

    /// Router bound to `id`, if any.
    #[must_use]
    pub fn get(&self, id: u32) -> Option<&Arc<dyn Router>> { self.table.get(&id) }

    /// Whether a router is bound to `id`.
    #[must_use]
    pub fn contains(&self, id: u32) -> bool { self.table.contains_key(&id) }

    /// Number of bound identifiers.
    #[must_use]
    pub fn len(&self) -> usize { self.table.len() }

    /// Whether no routes are bound.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.table.is_empty() }

    /// Bound identifiers in ascending order.
    #[must_use]
    pub fn ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.table.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

impl fmt::Debug for Routes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Routes").field("ids", &self.ids()).finish()
    }
}
