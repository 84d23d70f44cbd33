//! Writer pump: drain the outbound queue onto the socket.

use std::{io, time::Duration};

use log::{debug, warn};
use tokio::{
    io::{AsyncWrite, AsyncWriteExt},
    time::timeout,
};

use super::{Connection, OutboundFrames, task::StopOnExit};
use crate::metrics::{self, Direction};

/// Upper bound on flushing queued frames after the exit signal when no
/// write timeout is configured.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

async fn write_frame<W>(io: &mut W, frame: &[u8], limit: Option<Duration>) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let write = async {
        io.write_all(frame).await?;
        io.flush().await
    };
    match limit {
        Some(limit) => timeout(limit, write)
            .await
            .map_err(|_| io::Error::from(io::ErrorKind::TimedOut))?,
        None => write.await,
    }
}

/// Write frames accepted before the exit signal, bounded by `budget`.
async fn drain<W>(io: &mut W, outbound: &mut OutboundFrames, budget: Duration) -> usize
where
    W: AsyncWrite + Unpin,
{
    let mut written = 0;
    let flush = async {
        while let Some(frame) = outbound.try_recv() {
            io.write_all(&frame).await?;
            metrics::inc_frames(Direction::Outbound);
            written += 1;
        }
        io.flush().await
    };
    match timeout(budget, flush).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!("flush on close failed: error={e}"),
        Err(_) => warn!("flush on close timed out: budget={budget:?}"),
    }
    written
}

/// How the write loop ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum WriteExit {
    /// Exit signal or closed queue between frames; the stream is intact.
    Idle,
    /// Exit signal while a frame was part-written; the stream is torn.
    Interrupted,
    /// The socket write failed or timed out.
    Failed,
}

/// Write queued frames until the exit signal or a write error, then flush
/// what was already queued and shut the write half down.
///
/// The exit signal also interrupts a write blocked on a peer that stopped
/// reading. The interrupted frame is abandoned and nothing more is written.
pub(super) async fn run<W>(
    conn: Connection,
    mut io: W,
    mut outbound: OutboundFrames,
    write_timeout: Option<Duration>,
) -> W
where
    W: AsyncWrite + Unpin,
{
    let _stop = StopOnExit::new(conn.clone());
    let id = conn.id();
    let exit = conn.exit_signal().clone();

    let outcome = loop {
        let frame = tokio::select! {
            biased;

            () = exit.cancelled() => break WriteExit::Idle,
            frame = outbound.recv() => match frame {
                Some(frame) => frame,
                None => break WriteExit::Idle,
            },
        };
        let written = tokio::select! {
            biased;

            () = exit.cancelled() => break WriteExit::Interrupted,
            res = write_frame(&mut io, &frame, write_timeout) => res,
        };
        if let Err(e) = written {
            metrics::inc_errors();
            warn!("write failed, closing connection: error={e}, conn_id={id}");
            break WriteExit::Failed;
        }
        metrics::inc_frames(Direction::Outbound);
    };

    outbound.close();
    match outcome {
        WriteExit::Idle => {
            let budget = write_timeout.unwrap_or(FLUSH_TIMEOUT);
            let flushed = drain(&mut io, &mut outbound, budget).await;
            if flushed > 0 {
                debug!("flushed queued frames on close: count={flushed}, conn_id={id}");
            }
            match timeout(budget, io.shutdown()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => debug!("write shutdown failed: error={e}, conn_id={id}"),
                Err(_) => debug!("write shutdown timed out: conn_id={id}"),
            }
        }
        WriteExit::Interrupted => {
            debug!("stop interrupted a blocked write; queued frames discarded: conn_id={id}");
        }
        WriteExit::Failed => {}
    }
    io
}
