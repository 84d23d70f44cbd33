//! Error types for the wire codec.
//!
//! - [`DecodeError`]: the peer sent a malformed or oversized head, or closed the stream mid-frame.
//!   Terminates only the offending connection.
//! - [`EncodeError`]: a local caller tried to send something the wire format cannot carry. The
//!   connection is unaffected.
//! - [`CodecError`]: the error type used by the `tokio_util` codec, wrapping both of the above plus
//!   transport I/O errors.

use std::io;

use thiserror::Error;

/// Errors raised while decoding inbound frames.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// Fewer bytes than the fixed head size were supplied.
    #[error("incomplete frame head: have {have}, need {need}")]
    IncompleteHead {
        /// Bytes available.
        have: usize,
        /// Bytes required.
        need: usize,
    },

    /// The head declared a payload longer than the configured maximum.
    #[error("frame payload exceeds max length: {size} > {max}")]
    Oversized {
        /// Payload length declared by the peer.
        size: usize,
        /// Configured maximum payload length.
        max: usize,
    },

    /// The stream ended part-way through a frame.
    #[error("connection closed mid-frame: {received} of {expected} bytes received")]
    Truncated {
        /// Bytes of the current frame received before EOF.
        received: usize,
        /// Bytes the current frame needed (head plus declared payload, when known).
        expected: usize,
    },
}

/// Errors raised while encoding outbound messages.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum EncodeError {
    /// The payload is longer than the configured maximum or than `u32::MAX`.
    #[error("payload too large to encode: {size} > {max}")]
    PayloadTooLarge {
        /// Payload length supplied by the caller.
        size: usize,
        /// Largest payload the codec accepts.
        max: usize,
    },
}

/// Top-level codec error used by [`super::MessageCodec`].
#[derive(Debug, Error)]
pub enum CodecError {
    /// Inbound frame was malformed.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Outbound message violated a wire invariant.
    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),

    /// Transport I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl CodecError {
    /// Whether the error came from the peer's bytes rather than the transport.
    #[must_use]
    pub fn is_protocol_violation(&self) -> bool { matches!(self, Self::Decode(_)) }
}

impl From<CodecError> for io::Error {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::Io(e) => e,
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}
