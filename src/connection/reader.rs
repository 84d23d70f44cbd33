//! Reader pump: decode inbound frames and hand them to the worker pool.

use std::time::Duration;

use futures::StreamExt;
use log::{debug, info, warn};
use tokio::{io::AsyncRead, time::timeout};
use tokio_util::codec::FramedRead;

use super::{Connection, task::StopOnExit};
use crate::{
    codec::{CodecError, MessageCodec},
    dispatch::{Dispatcher, SubmitError},
    message::Message,
    metrics::{self, Direction},
    request::Request,
};

enum ReadEvent {
    Frame(Message),
    Eof,
    Failed(CodecError),
    TimedOut,
}

async fn next_event<R>(
    frames: &mut FramedRead<R, MessageCodec>,
    read_timeout: Option<Duration>,
) -> ReadEvent
where
    R: AsyncRead + Unpin,
{
    let next = match read_timeout {
        Some(limit) => match timeout(limit, frames.next()).await {
            Ok(next) => next,
            Err(_) => return ReadEvent::TimedOut,
        },
        None => frames.next().await,
    };
    match next {
        Some(Ok(msg)) => ReadEvent::Frame(msg),
        Some(Err(e)) => ReadEvent::Failed(e),
        None => ReadEvent::Eof,
    }
}

/// Read frames until EOF, a read or decode error, a read timeout, or the
/// exit signal. Stops the connection on the way out and returns the read
/// half so the task can reunite it with the write half.
pub(super) async fn run<R>(
    conn: Connection,
    io: R,
    dispatcher: Dispatcher,
    read_timeout: Option<Duration>,
) -> R
where
    R: AsyncRead + Unpin,
{
    let _stop = StopOnExit::new(conn.clone());
    let id = conn.id();
    let exit = conn.exit_signal().clone();
    let mut frames = FramedRead::new(io, MessageCodec::from_pack(conn.data_pack()));

    loop {
        let event = tokio::select! {
            biased;

            () = exit.cancelled() => break,
            event = next_event(&mut frames, read_timeout) => event,
        };
        match event {
            ReadEvent::Frame(msg) => {
                metrics::inc_frames(Direction::Inbound);
                let msg_id = msg.id();
                match dispatcher.submit(Request::new(conn.clone(), msg)).await {
                    Ok(()) => {}
                    Err(SubmitError::QueueFull { worker }) => {
                        metrics::inc_errors();
                        warn!("request dropped: worker={worker} queue full, msg_id={msg_id}, conn_id={id}");
                    }
                    Err(e) => {
                        debug!("reader stopping: error={e}, conn_id={id}");
                        break;
                    }
                }
            }
            ReadEvent::Eof => {
                debug!("peer closed connection: conn_id={id}");
                break;
            }
            ReadEvent::TimedOut => {
                info!("read timed out: conn_id={id}, timeout={read_timeout:?}");
                break;
            }
            ReadEvent::Failed(e) => {
                metrics::inc_errors();
                if e.is_protocol_violation() {
                    warn!("decode error, closing connection: error={e}, conn_id={id}");
                    tracing::warn!(error = %e, conn_id = %id, "decode error");
                } else {
                    debug!("read error: error={e}, conn_id={id}");
                }
                break;
            }
        }
    }
    frames.into_inner()
}
