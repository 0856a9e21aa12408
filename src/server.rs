//! TCP front end that feeds client lines into a shared command ring.
//!
//! Every connection gets its own [`Session`]. Each line a client sends is
//! committed to the ring and the whole log is echoed back. A line of the form
//! `AESDCHAR_IOCSEEKTO:<index>,<offset>` is not committed, instead the log is
//! echoed back starting at that byte of that command.

use crate::{Accumulator, Command, SharedRing, Session};
use anyhow::Context;
use chrono::Local;
use std::{
    io::{Read, Seek},
    net::SocketAddr,
    sync::Arc,
    time::Duration,
};
use tokio::{
    io::{AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    task::JoinSet,
    time::{Instant, interval_at},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Size of socket reads and writes.
const CHUNK_SIZE: usize = 1024;

/// Prefix of the control line that repositions a session.
const SEEK_TO_PREFIX: &[u8] = b"AESDCHAR_IOCSEEKTO:";

/// `strftime` format of timestamp commands, RFC 2822.
const TIMESTAMP_FORMAT: &str = "%a, %d %b %Y %T %z";

/// Target of a seek control line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeekTo {
    pub index: usize,
    pub offset: usize,
}

impl SeekTo {
    /// Parse a seek control line, `None` if the command is regular data.
    ///
    /// # Arguments
    ///
    /// * `command` - Complete command received from a client.
    pub fn parse(command: &[u8]) -> Option<Self> {
        let args = command.strip_prefix(SEEK_TO_PREFIX)?;
        let args = std::str::from_utf8(args).ok()?.trim_end();
        let (index, offset) = args.split_once(',')?;

        Some(Self {
            index: index.trim().parse().ok()?,
            offset: offset.trim().parse().ok()?,
        })
    }
}

/// Accept connections until shutdown, serving each one on its own task.
///
/// Returns once the listener stopped and every connection has closed.
///
/// # Arguments
///
/// * `listener` - Bound socket to accept connections from.
/// * `ring` - Ring shared by all connections.
/// * `shutdown` - Stops the server when cancelled.
pub async fn serve(
    listener: TcpListener,
    ring: Arc<SharedRing>,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let mut clients = JoinSet::new();

    loop {
        let (stream, peer) = tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!("accept failed: {e}");
                    continue;
                }
            },
        };

        info!("Accepted connection from {}", peer.ip());
        let ring = Arc::clone(&ring);
        let cancel = shutdown.child_token();
        clients.spawn(async move {
            if let Err(e) = handle_client(stream, peer, ring, cancel).await {
                warn!("connection from {peer} failed: {e:#}");
            }

            info!("Closed connection from {}", peer.ip());
        });
    }

    while clients.join_next().await.is_some() {}
    Ok(())
}

/// Serve a single client until it disconnects or the server shuts down.
async fn handle_client(
    mut stream: TcpStream,
    peer: SocketAddr,
    ring: Arc<SharedRing>,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let mut session = Session::new(ring, cancel.clone());
    let mut framer = Accumulator::new();
    let mut buf = vec![0; CHUNK_SIZE];

    loop {
        let read = tokio::select! {
            _ = cancel.cancelled() => break,
            read = stream.read(&mut buf) => read.context("receive failed")?,
        };

        // Client closed its side of the connection.
        if read == 0 {
            break;
        }

        let mut input = &buf[..read];
        while !input.is_empty() {
            if cancel.is_cancelled() {
                return Ok(());
            }

            let (command, rest) = framer.extract_terminated_prefix(input)?;
            input = rest;

            if let Some(command) = command {
                if apply(&mut session, command, peer)? {
                    reply(&mut session, &mut stream, &cancel).await?;
                }
            }
        }
    }

    Ok(())
}

/// Apply a complete line to the session, returning true if the client is owed a reply.
fn apply(session: &mut Session, command: Command, peer: SocketAddr) -> anyhow::Result<bool> {
    if let Some(seek) = SeekTo::parse(&command) {
        return match session.seek_to_command(seek.index, seek.offset) {
            Ok(position) => {
                debug!(?seek, position, "{peer} moved to command");
                Ok(true)
            }

            Err(e) => {
                warn!("{peer} sent an invalid seek: {e}");
                Ok(false)
            }
        };
    }

    session.commit(command)?;
    session.rewind()?;
    Ok(true)
}

/// Stream the log from the session's position to its end.
///
/// Stops early, without error, once `cancel` fires. A client that stops reading
/// cannot hold up shutdown.
async fn reply<W: AsyncWrite + Unpin>(
    session: &mut Session,
    writer: &mut W,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    let mut chunk = vec![0; CHUNK_SIZE];
    while !cancel.is_cancelled() {
        let read = session.read(&mut chunk)?;
        if read == 0 {
            break;
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            sent = writer.write_all(&chunk[..read]) => sent.context("send failed")?,
        }
    }

    Ok(())
}

/// Commit a timestamp command every `period` until cancelled.
///
/// The timestamps go through their own session, like any other producer.
///
/// # Arguments
///
/// * `ring` - Ring to commit timestamps to.
/// * `period` - Time between timestamps, the first one is written after one period.
/// * `cancel` - Stops the producer when cancelled.
pub async fn stamp_timestamps(ring: Arc<SharedRing>, period: Duration, cancel: CancellationToken) {
    let mut session = Session::new(ring, cancel.clone());
    let mut ticker = interval_at(Instant::now() + period, period);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let line = format!("timestamp:{}\n", Local::now().format(TIMESTAMP_FORMAT));
        if let Err(e) = session.submit(line.as_bytes()) {
            warn!("failed to commit timestamp: {e}");
        }
    }
}
