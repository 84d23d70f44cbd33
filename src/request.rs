//! A decoded message paired with the connection it arrived on.

use bytes::Bytes;

use crate::{connection::Connection, message::Message};

/// Request handed to router hooks.
///
/// Cheap to clone: the connection is a shared handle and the payload is
/// reference-counted.
#[derive(Clone, Debug)]
pub struct Request {
    conn: Connection,
    msg: Message,
}

impl Request {
    /// Pair a message with its connection.
    #[must_use]
    pub fn new(conn: Connection, msg: Message) -> Self { Self { conn, msg } }

    /// Connection the message arrived on.
    #[must_use]
    pub fn connection(&self) -> &Connection { &self.conn }

    /// Raw payload bytes.
    #[must_use]
    pub fn data(&self) -> &Bytes { self.msg.data() }

    /// Message identifier.
    #[must_use]
    pub fn msg_id(&self) -> u32 { self.msg.id() }

    /// The full decoded message.
    #[must_use]
    pub fn message(&self) -> &Message { &self.msg }
}
