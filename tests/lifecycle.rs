//! Tests for connection lifecycle callbacks.
//!
//! Start hooks run before the first request is handled; stop hooks run
//! exactly once after the socket closes, whichever side ends it.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use rstest::{fixture, rstest};
use tokio::time::{sleep, timeout};
use wirework::{
    connection::{Connection, ConnectionState},
    request::Request,
    router::handler,
    server::Server,
};
use wirework_testing::{FrameClient, TestServer};

type Events = Arc<Mutex<Vec<String>>>;

#[fixture]
fn events() -> Events { Arc::new(Mutex::new(Vec::new())) }

fn record(events: &Events, entry: String) { events.lock().expect("lock").push(entry); }

/// Server recording `start`, `handle` and `stop` events per connection. The
/// route on id 2 stops the connection from inside a handler.
fn recording_server(events: &Events) -> Server {
    let on_start = Arc::clone(events);
    let on_stop = Arc::clone(events);
    let on_handle = Arc::clone(events);
    Server::new("lifecycle")
        .on_conn_start(move |conn: Connection| {
            let events = Arc::clone(&on_start);
            async move {
                // Slow start hook: the handle event must still come after it.
                sleep(Duration::from_millis(20)).await;
                conn.set_property("greeted", true);
                record(&events, format!("start:{}", conn.id().as_u64()));
            }
        })
        .on_conn_stop(move |conn: Connection| {
            let events = Arc::clone(&on_stop);
            async move {
                assert_eq!(conn.state(), ConnectionState::Closed);
                record(&events, format!("stop:{}", conn.id().as_u64()));
            }
        })
        .add_router(
            1,
            handler(move |req: Request| {
                let events = Arc::clone(&on_handle);
                async move {
                    let greeted = req.connection().property::<bool>("greeted").is_some();
                    record(
                        &events,
                        format!("handle:{}:{greeted}", req.connection().id().as_u64()),
                    );
                    let _ = req.connection().send_msg(1, req.data().clone());
                }
            }),
        )
        .expect("register")
        .add_router(
            2,
            handler(|req: Request| async move {
                let _ = req.connection().send_msg(2, "bye");
                req.connection().stop();
            }),
        )
        .expect("register")
}

async fn wait_for(events: &Events, entry: &str) {
    timeout(Duration::from_secs(5), async {
        while !events.lock().expect("lock").iter().any(|e| e == entry) {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("event {entry} not recorded"));
}

fn count(events: &Events, entry: &str) -> usize {
    events
        .lock()
        .expect("lock")
        .iter()
        .filter(|e| *e == entry)
        .count()
}

/// Identifier of the only live connection on `server`.
async fn sole_connection_id(server: &TestServer) -> u64 {
    server.wait_for_connections(1).await;
    let ids = server.connections().ids();
    ids.first().expect("one connection").as_u64()
}

#[rstest]
#[tokio::test]
async fn client_close_runs_hooks_in_order_once(events: Events) {
    let server = TestServer::spawn(recording_server(&events)).await;
    let mut client = FrameClient::connect(server.addr()).await.expect("connect");
    let id = sole_connection_id(&server).await;
    client.request(1, "hi").await.expect("echo");
    drop(client);

    wait_for(&events, &format!("stop:{id}")).await;
    assert_eq!(
        *events.lock().expect("lock"),
        vec![
            format!("start:{id}"),
            format!("handle:{id}:true"),
            format!("stop:{id}"),
        ]
    );
    server.shutdown().await;
    assert_eq!(count(&events, &format!("stop:{id}")), 1);
}

#[rstest]
#[tokio::test]
async fn handler_stop_flushes_reply_then_closes(events: Events) {
    let server = TestServer::spawn(recording_server(&events)).await;
    let mut client = FrameClient::connect(server.addr()).await.expect("connect");
    let id = sole_connection_id(&server).await;

    let reply = client.request(2, "").await.expect("goodbye frame");
    assert_eq!(reply.data().as_ref(), b"bye");
    client.expect_closed().await.expect("server closed");
    wait_for(&events, &format!("stop:{id}")).await;
    server.wait_for_connections(0).await;

    server.shutdown().await;
    assert_eq!(count(&events, &format!("stop:{id}")), 1);
}

#[rstest]
#[tokio::test]
async fn server_shutdown_runs_stop_hook_for_every_connection(events: Events) {
    let server = TestServer::spawn(recording_server(&events)).await;
    let mut clients = Vec::new();
    for _ in 0..3 {
        clients.push(FrameClient::connect(server.addr()).await.expect("connect"));
    }
    server.wait_for_connections(3).await;
    let ids = server.connections().ids();
    for id in &ids {
        wait_for(&events, &format!("start:{}", id.as_u64())).await;
    }

    server.shutdown().await;
    for id in &ids {
        let stop = format!("stop:{}", id.as_u64());
        assert_eq!(count(&events, &stop), 1, "{id}");
    }
    for mut client in clients {
        client.expect_closed().await.expect("closed by shutdown");
    }
}
