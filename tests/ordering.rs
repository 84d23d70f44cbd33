//! Per-connection request ordering across worker pool sizes.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use rstest::rstest;
use tokio::time::sleep;
use wirework::{config::ServerConfig, request::Request, router::handler, server::Server};
use wirework_testing::{FrameClient, TestServer};

const REQUESTS: u32 = 32;
const CLIENTS: usize = 3;

/// Echo server whose handler yields for a moment on odd sequence numbers so
/// that any reordering between workers would surface.
fn sequencing_server(workers: usize, seen: Arc<Mutex<Vec<(u64, u32)>>>) -> Server {
    Server::with_config(
        "ordering",
        ServerConfig {
            worker_pool_size: workers,
            ..ServerConfig::default()
        },
    )
    .add_router(
        1,
        handler(move |req: Request| {
            let seen = Arc::clone(&seen);
            async move {
                let seq = u32::from_le_bytes(
                    <[u8; 4]>::try_from(&req.data()[..4]).expect("four byte sequence"),
                );
                if seq % 2 == 1 {
                    sleep(Duration::from_millis(1)).await;
                }
                seen.lock()
                    .expect("lock")
                    .push((req.connection().id().as_u64(), seq));
                let _ = req.connection().send_msg_wait(1, req.data().clone()).await;
            }
        }),
    )
    .expect("register")
}

#[rstest]
#[case::inline(0)]
#[case::single(1)]
#[case::few(2)]
#[case::many(8)]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn requests_are_handled_in_arrival_order(#[case] workers: usize) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let server = TestServer::spawn(sequencing_server(workers, Arc::clone(&seen))).await;

    let mut tasks = Vec::new();
    for _ in 0..CLIENTS {
        let addr = server.addr();
        tasks.push(tokio::spawn(async move {
            let mut client = FrameClient::connect(addr).await.expect("connect");
            for seq in 0..REQUESTS {
                client.send(1, seq.to_le_bytes().to_vec()).await.expect("send");
            }
            for seq in 0..REQUESTS {
                let reply = client.recv().await.expect("reply");
                assert_eq!(reply.data().as_ref(), seq.to_le_bytes().as_slice());
            }
        }));
    }
    for task in tasks {
        task.await.expect("client task");
    }
    server.shutdown().await;

    let seen = seen.lock().expect("lock");
    assert_eq!(seen.len(), CLIENTS * REQUESTS as usize);
    let mut ids: Vec<u64> = seen.iter().map(|(id, _)| *id).collect();
    ids.sort_unstable();
    ids.dedup();
    for id in ids {
        let order: Vec<u32> = seen
            .iter()
            .filter(|(conn, _)| *conn == id)
            .map(|(_, seq)| *seq)
            .collect();
        assert_eq!(order, (0..REQUESTS).collect::<Vec<_>>(), "connection {id}");
    }
}
