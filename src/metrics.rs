//! Metric helpers for `wirework`.
//!
//! Names and thin wrappers around the [`metrics`](https://docs.rs/metrics)
//! crate. Without the `metrics` feature every helper is a no-op.

#[cfg(feature = "metrics")]
use metrics::{counter, gauge};

/// Gauge tracking live connections.
pub const CONNECTIONS_ACTIVE: &str = "wirework_connections_active";
/// Counter tracking frames decoded or written.
pub const FRAMES_PROCESSED: &str = "wirework_frames_processed_total";
/// Counter tracking connection-level errors (decode, I/O, dropped requests).
pub const ERRORS_TOTAL: &str = "wirework_errors_total";
/// Counter tracking panics caught in router hooks.
pub const HANDLER_FAULTS: &str = "wirework_handler_faults_total";
/// Counter tracking sockets refused because the server was full.
pub const CONNECTIONS_REFUSED: &str = "wirework_connections_refused_total";

/// Direction of frame processing.
#[derive(Clone, Copy, Debug)]
pub enum Direction {
    /// Frames received from a client.
    Inbound,
    /// Frames written to a client.
    Outbound,
}

impl Direction {
    #[cfg_attr(not(feature = "metrics"), allow(dead_code))]
    fn as_str(self) -> &'static str {
        match self {
            Direction::Inbound => "inbound",
            Direction::Outbound => "outbound",
        }
    }
}

/// Increment the active connections gauge.
pub fn inc_connections() {
    #[cfg(feature = "metrics")]
    gauge!(CONNECTIONS_ACTIVE).increment(1.0);
}

/// Decrement the active connections gauge.
pub fn dec_connections() {
    #[cfg(feature = "metrics")]
    gauge!(CONNECTIONS_ACTIVE).decrement(1.0);
}

/// Record a processed frame for the given direction.
pub fn inc_frames(direction: Direction) {
    #[cfg(feature = "metrics")]
    counter!(FRAMES_PROCESSED, "direction" => direction.as_str()).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = direction;
}

/// Record a connection-level error.
pub fn inc_errors() {
    #[cfg(feature = "metrics")]
    counter!(ERRORS_TOTAL).increment(1);
}

/// Record a panic caught in a router hook.
pub fn inc_handler_faults() {
    #[cfg(feature = "metrics")]
    counter!(HANDLER_FAULTS).increment(1);
}

/// Record a refused connection.
pub fn inc_connections_refused() {
    #[cfg(feature = "metrics")]
    counter!(CONNECTIONS_REFUSED).increment(1);
}
