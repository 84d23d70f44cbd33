//! Tests for server construction and binding.

use std::sync::Arc;

use rstest::rstest;

use super::{Server, test_util::free_listener};
use crate::{
    config::ServerConfig,
    request::Request,
    router::{RouteError, Router, handler},
};

struct Noop;

impl Router for Noop {}

#[test]
fn new_uses_defaults_and_name() {
    let server = Server::new("lobby");
    assert_eq!(server.name(), "lobby");
    assert_eq!(server.config().port, 8999);
    assert!(server.local_addr().is_none());
    assert!(server.routes().is_empty());
}

#[test]
fn with_config_normalizes_and_renames() {
    let server = Server::with_config(
        "chat",
        ServerConfig {
            name: String::from("ignored"),
            max_worker_task_len: 0,
            ..ServerConfig::default()
        },
    );
    assert_eq!(server.name(), "chat");
    assert_eq!(server.config().max_worker_task_len, 1);
}

#[test]
fn duplicate_router_is_rejected() {
    let err = Server::new("dup")
        .add_router(1, Noop)
        .expect("first route")
        .add_router(1, handler(|_req: Request| async {}))
        .err()
        .expect("second registration fails");
    assert_eq!(err, RouteError::DuplicateRoute(1));
}

#[rstest]
#[tokio::test]
async fn binding_keeps_routes_and_reports_addr(free_listener: std::net::TcpListener) {
    let expected = free_listener.local_addr().expect("addr");
    let server = Server::new("bound")
        .add_router(3, Noop)
        .expect("route")
        .bind_listener(free_listener)
        .expect("bind");
    assert_eq!(server.local_addr(), Some(expected));
    assert_eq!(server.routes().ids(), vec![3]);
}

#[test]
fn handle_shares_the_connection_registry() {
    let server = Server::new("handles");
    let a = server.handle();
    let b = server.handle();
    assert!(Arc::ptr_eq(&a.connections(), &b.connections()));
    assert!(!a.is_stopping());
    b.stop();
    assert!(a.is_stopping());
}
