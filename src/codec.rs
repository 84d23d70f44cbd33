//! Wire codec for length-prefixed frames.
//!
//! Every frame starts with a fixed [`HEAD_LEN`]-byte head carrying the payload
//! length and the message identifier, both little-endian `u32`s, followed by
//! exactly that many payload bytes:
//!
//! ```text
//! +-------------+-------------+---------------------+
//! | data_len:u32| id:u32      | data[data_len]      |
//! +-------------+-------------+---------------------+
//! ```
//!
//! There is no magic number, checksum or version byte. Because the head size
//! is constant, decoding is a two-phase affair: read the head, validate the
//! declared length against the configured maximum, then read exactly that
//! many bytes. The length check always happens before any payload buffer is
//! reserved.
//!
//! [`DataPack`] exposes the raw pack/unpack operations. [`MessageCodec`] wraps
//! them as a `tokio_util` [`Decoder`]/[`Encoder`] so sockets can be driven with
//! `FramedRead`/`FramedWrite`.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::{
    byte_order::{read_wire_u32, write_wire_u32},
    message::Message,
};

pub mod error;

pub use error::{CodecError, DecodeError, EncodeError};

/// Size of the frame head in bytes.
pub const HEAD_LEN: usize = 8;

/// Default maximum payload length in bytes.
pub const DEFAULT_MAX_PAYLOAD: usize = 4096;

/// Decoded frame head.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameHead {
    /// Message identifier.
    pub id: u32,
    /// Declared payload length.
    pub data_len: u32,
}

impl FrameHead {
    /// Payload length as a `usize`.
    #[must_use]
    pub fn payload_len(&self) -> usize { self.data_len as usize }
}

/// Packs and unpacks frames, enforcing a maximum payload length.
///
/// # Examples
///
/// ```
/// use wirework::{
///     codec::{DataPack, HEAD_LEN},
///     message::Message,
/// };
///
/// let pack = DataPack::new(1024);
/// let bytes = pack.pack(&Message::new(7, "hello")).expect("pack");
/// let head = pack.unpack_head(&bytes[..HEAD_LEN]).expect("head");
/// assert_eq!(head.id, 7);
/// assert_eq!(head.data_len, 5);
/// assert_eq!(&bytes[HEAD_LEN..], b"hello");
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DataPack {
    max_payload: usize,
}

impl Default for DataPack {
    fn default() -> Self { Self::new(DEFAULT_MAX_PAYLOAD) }
}

impl DataPack {
    /// Create a codec accepting payloads of at most `max_payload` bytes.
    #[must_use]
    pub const fn new(max_payload: usize) -> Self { Self { max_payload } }

    /// Size of the fixed frame head.
    #[must_use]
    pub const fn head_len(&self) -> usize { HEAD_LEN }

    /// Maximum payload length accepted in either direction.
    #[must_use]
    pub const fn max_payload(&self) -> usize { self.max_payload }

    /// Encode `msg` into a freshly allocated frame.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError::PayloadTooLarge`] if the payload exceeds the
    /// configured maximum or cannot be described by a `u32` length.
    pub fn pack(&self, msg: &Message) -> Result<Bytes, EncodeError> {
        let mut dst = BytesMut::with_capacity(HEAD_LEN + msg.data_len());
        self.pack_into(msg, &mut dst)?;
        Ok(dst.freeze())
    }

    /// Append the encoding of `msg` to `dst`.
    ///
    /// # Errors
    ///
    /// See [`DataPack::pack`].
    pub fn pack_into(&self, msg: &Message, dst: &mut BytesMut) -> Result<(), EncodeError> {
        let size = msg.data_len();
        let max = self.max_payload.min(u32::MAX as usize);
        let data_len = u32::try_from(size)
            .ok()
            .filter(|_| size <= max)
            .ok_or(EncodeError::PayloadTooLarge { size, max })?;
        dst.reserve(HEAD_LEN + size);
        dst.put_slice(&write_wire_u32(data_len));
        dst.put_slice(&write_wire_u32(msg.id()));
        dst.put_slice(msg.data());
        Ok(())
    }

    /// Decode a frame head.
    ///
    /// Only the first [`HEAD_LEN`] bytes of `head` are read.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::IncompleteHead`] if fewer than [`HEAD_LEN`]
    /// bytes are supplied and [`DecodeError::Oversized`] if the declared
    /// payload length exceeds the configured maximum.
    pub fn unpack_head(&self, head: &[u8]) -> Result<FrameHead, DecodeError> {
        let incomplete = DecodeError::IncompleteHead {
            have: head.len(),
            need: HEAD_LEN,
        };
        let (len_bytes, id_bytes) = head
            .get(..HEAD_LEN)
            .map(|h| h.split_at(4))
            .ok_or(incomplete)?;
        let data_len = read_wire_u32(len_bytes.try_into().map_err(|_| incomplete)?);
        let id = read_wire_u32(id_bytes.try_into().map_err(|_| incomplete)?);
        if data_len as usize > self.max_payload {
            return Err(DecodeError::Oversized {
                size: data_len as usize,
                max: self.max_payload,
            });
        }
        Ok(FrameHead { id, data_len })
    }
}

/// Streaming codec turning bytes into [`Message`]s and back.
///
/// The decoder remembers a validated head between calls so a partially
/// received payload never causes the head to be parsed twice.
#[derive(Clone, Debug, Default)]
pub struct MessageCodec {
    pack: DataPack,
    pending: Option<FrameHead>,
}

impl MessageCodec {
    /// Create a codec with the given maximum payload length.
    #[must_use]
    pub fn new(max_payload: usize) -> Self { Self::from_pack(DataPack::new(max_payload)) }

    /// Create a codec from an existing [`DataPack`].
    #[must_use]
    pub fn from_pack(pack: DataPack) -> Self {
        Self {
            pack,
            pending: None,
        }
    }

    /// The underlying pack configuration.
    #[must_use]
    pub fn data_pack(&self) -> DataPack { self.pack }
}

impl Decoder for MessageCodec {
    type Item = Message;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let head = if let Some(head) = self.pending {
            head
        } else {
            if src.len() < HEAD_LEN {
                return Ok(None);
            }
            let head = self.pack.unpack_head(&src[..])?;
            src.advance(HEAD_LEN);
            self.pending = Some(head);
            head
        };

        let len = head.payload_len();
        if src.len() < len {
            src.reserve(len - src.len());
            return Ok(None);
        }
        self.pending = None;
        let data = src.split_to(len).freeze();
        Ok(Some(Message::new(head.id, data)))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(msg) = self.decode(src)? {
            return Ok(Some(msg));
        }
        match self.pending.take() {
            Some(head) => Err(DecodeError::Truncated {
                received: HEAD_LEN + src.len(),
                expected: HEAD_LEN + head.payload_len(),
            }
            .into()),
            None if src.is_empty() => Ok(None),
            None => Err(DecodeError::Truncated {
                received: src.len(),
                expected: HEAD_LEN,
            }
            .into()),
        }
    }
}

impl Encoder<Message> for MessageCodec {
    type Error = CodecError;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        self.pack.pack_into(&item, dst).map_err(CodecError::from)
    }
}

#[cfg(test)]
mod tests;
