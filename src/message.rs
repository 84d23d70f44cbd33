//! Messages exchanged over the wire.
//!
//! A [`Message`] is a routing identifier plus an opaque payload. The payload
//! is never interpreted by the framework; handlers decide what it means.

use bytes::Bytes;

/// A routed message: numeric identifier and opaque payload.
///
/// # Examples
///
/// ```
/// use wirework::message::Message;
///
/// let msg = Message::new(1, "ping");
/// assert_eq!(msg.id(), 1);
/// assert_eq!(msg.data_len(), 4);
/// assert_eq!(msg.data().as_ref(), b"ping");
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Message {
    id: u32,
    data: Bytes,
}

impl Message {
    /// Build a message from an identifier and payload.
    pub fn new(id: u32, data: impl Into<Bytes>) -> Self {
        Self {
            id,
            data: data.into(),
        }
    }

    /// Routing identifier of the message.
    #[must_use]
    pub fn id(&self) -> u32 { self.id }

    /// Payload bytes.
    #[must_use]
    pub fn data(&self) -> &Bytes { &self.data }

    /// Payload length in bytes.
    #[must_use]
    pub fn data_len(&self) -> usize { self.data.len() }

    /// Consume the message, returning the identifier and payload.
    #[must_use]
    pub fn into_parts(self) -> (u32, Bytes) { (self.id, self.data) }
}
