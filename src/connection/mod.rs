//! Per-connection state and the two I/O pumps that drive it.
//!
//! A [`Connection`] is a cheap, cloneable handle. Handlers use it to queue
//! outbound messages with [`Connection::send_msg`] and to end the session with
//! [`Connection::stop`]. The socket itself is owned by the connection task,
//! which runs a reader pump and a writer pump as independent tokio tasks joined
//! only by the outbound queue and the exit signal.
//!
//! Lifecycle: `Created → Running → Closing → Closed`. The start hook fires
//! before the pumps start, and the stop hook fires once both pumps have exited
//! and the socket has been dropped.

mod properties;
mod reader;
mod task;
mod writer;

use std::{
    fmt,
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering},
    },
    time::Duration,
};

use bytes::Bytes;
use log::debug;
pub use properties::PropertyBag;
pub(crate) use task::ConnectionTask;
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;

use crate::{
    codec::{DEFAULT_MAX_PAYLOAD, DataPack, EncodeError},
    message::Message,
};

/// Identifier assigned to a connection, unique for the life of the process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

/// Source of [`ConnectionId::next`]; shared by every server in the process.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(0);

impl From<u64> for ConnectionId {
    fn from(value: u64) -> Self { Self(value) }
}

impl ConnectionId {
    /// Create a new [`ConnectionId`] with the provided value.
    #[must_use]
    pub const fn new(id: u64) -> Self { Self(id) }

    /// Allocate an identifier never handed out before in this process.
    ///
    /// Identifiers increase monotonically from zero across every server and
    /// every run.
    #[must_use]
    pub fn next() -> Self { Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed)) }

    /// Return the inner `u64` representation.
    #[must_use]
    pub const fn as_u64(&self) -> u64 { self.0 }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConnectionId({})", self.0)
    }
}

/// Lifecycle state of a connection. States only ever move forward.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum ConnectionState {
    /// Registered, start hook not yet complete.
    Created = 0,
    /// Pumps are running.
    Running = 1,
    /// Stop requested; pumps are winding down.
    Closing = 2,
    /// Pumps exited, socket closed, stop hook fired.
    Closed = 3,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Created,
            1 => Self::Running,
            2 => Self::Closing,
            _ => Self::Closed,
        }
    }
}

/// Errors returned when queueing an outbound message.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum SendError {
    /// The message could not be encoded.
    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),
    /// The outbound queue is full.
    #[error("outbound queue full")]
    Backpressure,
    /// The connection is closing or closed.
    #[error("connection closed")]
    ConnectionClosed,
}

/// Per-connection settings derived from the server configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConnectionSettings {
    /// Largest payload accepted inbound or queued outbound.
    pub max_payload: usize,
    /// Capacity of the outbound frame queue.
    pub outbound_capacity: usize,
    /// Close the connection if no frame arrives within this window.
    pub read_timeout: Option<Duration>,
    /// Close the connection if a single frame write takes longer than this.
    pub write_timeout: Option<Duration>,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            max_payload: DEFAULT_MAX_PAYLOAD,
            outbound_capacity: 1024,
            read_timeout: None,
            write_timeout: None,
        }
    }
}

struct ConnectionInner {
    id: ConnectionId,
    peer_addr: Option<SocketAddr>,
    pack: DataPack,
    outbound: mpsc::Sender<Bytes>,
    exit: CancellationToken,
    closed: AtomicBool,
    state: AtomicU8,
    properties: PropertyBag,
}

/// Cloneable handle to a live connection.
///
/// # Examples
///
/// ```
/// use wirework::connection::{Connection, ConnectionId, ConnectionSettings, SendError};
///
/// # #[tokio::main]
/// # async fn main() {
/// let (conn, mut outbound) =
///     Connection::new(ConnectionId::new(1), None, ConnectionSettings::default());
/// conn.send_msg(1, "pong").expect("queue has room");
/// assert!(outbound.recv().await.is_some());
///
/// conn.stop();
/// assert_eq!(conn.send_msg(1, "late"), Err(SendError::ConnectionClosed));
/// # }
/// ```
#[derive(Clone)]
pub struct Connection(Arc<ConnectionInner>);

/// Receiving end of a connection's outbound queue.
///
/// The writer pump owns this in a served connection. Constructing a
/// [`Connection`] directly hands it to the caller, which is useful for
/// exercising routers without a socket.
pub struct OutboundFrames(mpsc::Receiver<Bytes>);

impl OutboundFrames {
    /// Await the next encoded frame.
    pub async fn recv(&mut self) -> Option<Bytes> { self.0.recv().await }

    /// Take the next encoded frame if one is queued.
    pub fn try_recv(&mut self) -> Option<Bytes> { self.0.try_recv().ok() }

    /// Refuse further frames; already queued frames remain readable.
    pub fn close(&mut self) { self.0.close(); }
}

impl Connection {
    /// Create a connection in the [`ConnectionState::Created`] state.
    ///
    /// Returns the handle and the receiving end of its outbound queue.
    #[must_use]
    pub fn new(
        id: ConnectionId,
        peer_addr: Option<SocketAddr>,
        settings: ConnectionSettings,
    ) -> (Self, OutboundFrames) {
        let (tx, rx) = mpsc::channel(settings.outbound_capacity.max(1));
        let inner = ConnectionInner {
            id,
            peer_addr,
            pack: DataPack::new(settings.max_payload),
            outbound: tx,
            exit: CancellationToken::new(),
            closed: AtomicBool::new(false),
            state: AtomicU8::new(ConnectionState::Created as u8),
            properties: PropertyBag::default(),
        };
        (Self(Arc::new(inner)), OutboundFrames(rx))
    }

    /// Identifier of this connection.
    #[must_use]
    pub fn id(&self) -> ConnectionId { self.0.id }

    /// Remote address, if it was available at accept time.
    #[must_use]
    pub fn peer_addr(&self) -> Option<SocketAddr> { self.0.peer_addr }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.0.state.load(Ordering::Acquire))
    }

    /// Whether [`Connection::stop`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool { self.0.closed.load(Ordering::Acquire) }

    /// Resolve once the connection has been asked to stop.
    pub async fn closed(&self) { self.0.exit.cancelled().await; }

    /// Connection-scoped key/value storage.
    #[must_use]
    pub fn properties(&self) -> &PropertyBag { &self.0.properties }

    /// Store a connection-scoped property, replacing any previous value.
    pub fn set_property<T>(&self, key: impl Into<String>, value: T)
    where
        T: Send + Sync + 'static,
    {
        self.0.properties.set(key, value);
    }

    /// Fetch a property if present and of type `T`.
    #[must_use]
    pub fn property<T>(&self, key: &str) -> Option<Arc<T>>
    where
        T: Send + Sync + 'static,
    {
        self.0.properties.get(key)
    }

    /// Remove a property, returning whether one existed.
    pub fn remove_property(&self, key: &str) -> bool { self.0.properties.remove(key) }

    /// Encode a message and queue it for the writer pump without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`SendError::ConnectionClosed`] once the connection is
    /// stopping, [`SendError::Encode`] if the payload exceeds the configured
    /// maximum, and [`SendError::Backpressure`] if the outbound queue is full.
    pub fn send_msg(&self, id: u32, data: impl Into<Bytes>) -> Result<(), SendError> {
        let frame = self.encode(id, data)?;
        match self.0.outbound.try_send(frame) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(SendError::Backpressure),
            Err(TrySendError::Closed(_)) => Err(SendError::ConnectionClosed),
        }
    }

    /// Encode a message and queue it, waiting for room in the outbound queue.
    ///
    /// The wait ends early if the connection is stopped.
    ///
    /// # Errors
    ///
    /// Returns [`SendError::ConnectionClosed`] if the connection is stopping
    /// before or while waiting, and [`SendError::Encode`] if the payload
    /// exceeds the configured maximum.
    pub async fn send_msg_wait(&self, id: u32, data: impl Into<Bytes>) -> Result<(), SendError> {
        let frame = self.encode(id, data)?;
        tokio::select! {
            biased;

            () = self.0.exit.cancelled() => Err(SendError::ConnectionClosed),
            res = self.0.outbound.send(frame) => res.map_err(|_| SendError::ConnectionClosed),
        }
    }

    fn encode(&self, id: u32, data: impl Into<Bytes>) -> Result<Bytes, SendError> {
        if self.is_closed() {
            return Err(SendError::ConnectionClosed);
        }
        Ok(self.0.pack.pack(&Message::new(id, data))?)
    }

    /// Ask the connection to shut down.
    ///
    /// Idempotent. Moves the connection to [`ConnectionState::Closing`] and
    /// fires the exit signal, which both pumps observe at their next
    /// suspension point. Later sends fail with [`SendError::ConnectionClosed`].
    pub fn stop(&self) {
        if self.0.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.advance(ConnectionState::Closing);
        self.0.exit.cancel();
        debug!("connection stopping: id={}, peer={:?}", self.0.id, self.0.peer_addr);
    }

    pub(crate) fn exit_signal(&self) -> &CancellationToken { &self.0.exit }

    pub(crate) fn data_pack(&self) -> DataPack { self.0.pack }

    /// Move the state forward; never moves it backward.
    pub(crate) fn advance(&self, to: ConnectionState) {
        self.0.state.fetch_max(to as u8, Ordering::AcqRel);
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.0.id)
            .field("peer_addr", &self.0.peer_addr)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
