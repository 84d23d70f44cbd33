#![cfg(feature = "metrics")]
//! Tests for `wirework` metrics.
//!
//! Helper tests use a thread-local `DebuggingRecorder`; the end-to-end test
//! installs one globally because connection tasks record from many threads.

use std::sync::OnceLock;

use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};
use rstest::rstest;
use wirework::metrics::{self as wm, Direction};
use wirework_testing::{FrameClient, TestServer, echo_server};

/// Creates a debugging recorder and snapshotter for metrics testing.
fn debugging_recorder_setup() -> (Snapshotter, DebuggingRecorder) {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    (snapshotter, recorder)
}

fn counter(snapshotter: &Snapshotter, name: &str, label: Option<(&str, &str)>) -> u64 {
    snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .filter(|(k, _, _, _)| {
            k.key().name() == name
                && label.is_none_or(|(key, value)| {
                    k.key()
                        .labels()
                        .any(|l| l.key() == key && l.value() == value)
                })
        })
        .map(|(_, _, _, v)| match v {
            DebugValue::Counter(c) => c,
            _ => 0,
        })
        .sum()
}

#[rstest]
#[case(Direction::Inbound, "inbound")]
#[case(Direction::Outbound, "outbound")]
fn frame_metric_is_labelled_by_direction(#[case] direction: Direction, #[case] label: &str) {
    let (snapshotter, recorder) = debugging_recorder_setup();
    metrics::with_local_recorder(&recorder, || wm::inc_frames(direction));
    assert_eq!(
        counter(&snapshotter, wm::FRAMES_PROCESSED, Some(("direction", label))),
        1
    );
}

#[rstest]
#[case(1)]
#[case(3)]
fn handler_faults_are_counted(#[case] expected: u64) {
    let (snapshotter, recorder) = debugging_recorder_setup();
    metrics::with_local_recorder(&recorder, || {
        (0..expected).for_each(|_| wm::inc_handler_faults());
    });
    assert_eq!(counter(&snapshotter, wm::HANDLER_FAULTS, None), expected);
}

#[test]
fn refusals_and_errors_are_counted() {
    let (snapshotter, recorder) = debugging_recorder_setup();
    metrics::with_local_recorder(&recorder, || {
        wm::inc_connections_refused();
        wm::inc_errors();
        wm::inc_errors();
    });
    assert_eq!(counter(&snapshotter, wm::CONNECTIONS_REFUSED, None), 1);
    assert_eq!(counter(&snapshotter, wm::ERRORS_TOTAL, None), 2);
}

#[test]
fn connection_gauge_balances() {
    let (snapshotter, recorder) = debugging_recorder_setup();
    metrics::with_local_recorder(&recorder, || {
        wm::inc_connections();
        wm::inc_connections();
        wm::dec_connections();
    });
    let gauge = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .find(|(k, _, _, _)| k.key().name() == wm::CONNECTIONS_ACTIVE)
        .map(|(_, _, _, v)| v);
    assert!(matches!(gauge, Some(DebugValue::Gauge(g)) if g.into_inner() == 1.0));
}

fn global_snapshotter() -> &'static Snapshotter {
    static SNAPSHOTTER: OnceLock<Snapshotter> = OnceLock::new();
    SNAPSHOTTER.get_or_init(|| {
        let (snapshotter, recorder) = debugging_recorder_setup();
        metrics::set_global_recorder(recorder).expect("no other global recorder");
        snapshotter
    })
}

#[tokio::test]
async fn served_frames_are_counted_in_both_directions() {
    let snapshotter = global_snapshotter();
    let server = TestServer::spawn(echo_server(1)).await;
    let mut client = FrameClient::connect(server.addr()).await.expect("connect");
    for _ in 0..3 {
        client.request(1, "ping").await.expect("echo");
    }

    // The writer records after the bytes leave, so allow it to catch up.
    for label in ["inbound", "outbound"] {
        tokio::time::timeout(std::time::Duration::from_secs(5), async {
            while counter(snapshotter, wm::FRAMES_PROCESSED, Some(("direction", label))) < 3 {
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("frames counted");
    }
    drop(client);
    server.shutdown().await;
}
