//! Minimal frame client for driving a server over TCP.

use std::{io, net::SocketAddr, time::Duration};

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::{io::AsyncWriteExt, net::TcpStream, time::timeout};
use tokio_util::codec::Framed;
use wirework::{
    codec::{CodecError, DEFAULT_MAX_PAYLOAD, MessageCodec},
    message::Message,
};

/// How long [`FrameClient::recv`] waits before giving up.
pub const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors surfaced by [`FrameClient`].
#[derive(Debug)]
pub enum ClientError {
    /// The codec or socket failed.
    Codec(CodecError),
    /// No frame arrived within [`RECV_TIMEOUT`].
    TimedOut,
    /// The server closed the connection.
    Closed,
}

impl From<CodecError> for ClientError {
    fn from(e: CodecError) -> Self { Self::Codec(e) }
}

impl From<io::Error> for ClientError {
    fn from(e: io::Error) -> Self { Self::Codec(CodecError::Io(e)) }
}

/// TCP client speaking the wire protocol through [`MessageCodec`].
pub struct FrameClient {
    framed: Framed<TcpStream, MessageCodec>,
}

impl FrameClient {
    /// Connect with the default payload limit.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the connection fails.
    pub async fn connect(addr: SocketAddr) -> io::Result<Self> {
        Self::connect_with_max(addr, DEFAULT_MAX_PAYLOAD).await
    }

    /// Connect with an explicit payload limit for both directions.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the connection fails.
    pub async fn connect_with_max(addr: SocketAddr, max_payload: usize) -> io::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        Ok(Self {
            framed: Framed::new(stream, MessageCodec::new(max_payload)),
        })
    }

    /// Send one message.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Codec`] if encoding or writing fails.
    pub async fn send(&mut self, id: u32, data: impl Into<Bytes>) -> Result<(), ClientError> {
        self.framed.send(Message::new(id, data)).await?;
        Ok(())
    }

    /// Write raw bytes, bypassing the encoder.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the write fails.
    pub async fn send_raw(&mut self, bytes: &[u8]) -> io::Result<()> {
        let stream = self.framed.get_mut();
        stream.write_all(bytes).await?;
        stream.flush().await
    }

    /// Receive the next message.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Closed`] on EOF, [`ClientError::TimedOut`] if
    /// nothing arrives in time, and [`ClientError::Codec`] on decode or I/O
    /// failure.
    pub async fn recv(&mut self) -> Result<Message, ClientError> {
        match timeout(RECV_TIMEOUT, self.framed.next()).await {
            Err(_) => Err(ClientError::TimedOut),
            Ok(None) => Err(ClientError::Closed),
            Ok(Some(res)) => Ok(res?),
        }
    }

    /// Send a message and wait for the next reply.
    ///
    /// # Errors
    ///
    /// See [`FrameClient::send`] and [`FrameClient::recv`].
    pub async fn request(&mut self, id: u32, data: impl Into<Bytes>) -> Result<Message, ClientError> {
        self.send(id, data).await?;
        self.recv().await
    }

    /// Wait until the server closes the connection.
    ///
    /// Frames still in flight are discarded. Resets count as closed.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::TimedOut`] if the connection stays open.
    pub async fn expect_closed(&mut self) -> Result<(), ClientError> {
        loop {
            match self.recv().await {
                Ok(_) => {}
                Err(ClientError::Closed | ClientError::Codec(CodecError::Io(_))) => return Ok(()),
                Err(e) => return Err(e),
            }
        }
    }
}
