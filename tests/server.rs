//! End to end tests of the socket server over loopback TCP.

use cmdring::server::serve;
use cmdring::{RING_CAPACITY, SharedRing};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    task::JoinHandle,
    time::timeout,
};
use tokio_util::sync::CancellationToken;

/// Running server for the duration of a test.
struct Harness {
    addr: SocketAddr,
    ring: Arc<SharedRing>,
    shutdown: CancellationToken,
    server: JoinHandle<anyhow::Result<()>>,
}

impl Harness {
    async fn start() -> anyhow::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let ring = Arc::new(SharedRing::new());
        let shutdown = CancellationToken::new();
        let server = tokio::spawn(serve(listener, Arc::clone(&ring), shutdown.clone()));

        Ok(Self {
            addr,
            ring,
            shutdown,
            server,
        })
    }

    async fn stop(self) -> anyhow::Result<()> {
        self.shutdown.cancel();
        timeout(Duration::from_secs(5), self.server).await???;
        Ok(())
    }
}

/// Send bytes and read back exactly `expected.len()` bytes.
async fn exchange(stream: &mut TcpStream, send: &[u8], expected: &[u8]) -> anyhow::Result<()> {
    stream.write_all(send).await?;

    let mut received = vec![0; expected.len()];
    timeout(Duration::from_secs(5), stream.read_exact(&mut received)).await??;
    assert_eq!(String::from_utf8_lossy(&received), String::from_utf8_lossy(expected));
    Ok(())
}

#[tokio::test]
async fn echoes_whole_log() -> anyhow::Result<()> {
    let harness = Harness::start().await?;
    let mut client = TcpStream::connect(harness.addr).await?;

    exchange(&mut client, b"hello\n", b"hello\n").await?;
    exchange(&mut client, b"wor", b"").await?;
    exchange(&mut client, b"ld\n", b"hello\nworld\n").await?;

    // Two lines in one write get two replies.
    exchange(&mut client, b"a\nb\n", b"hello\nworld\na\nhello\nworld\na\nb\n").await?;

    drop(client);
    harness.stop().await
}

#[tokio::test]
async fn clients_share_the_log() -> anyhow::Result<()> {
    let harness = Harness::start().await?;
    let mut first = TcpStream::connect(harness.addr).await?;
    let mut second = TcpStream::connect(harness.addr).await?;

    exchange(&mut first, b"one\n", b"one\n").await?;
    exchange(&mut second, b"two\n", b"one\ntwo\n").await?;

    drop((first, second));
    harness.stop().await
}

#[tokio::test]
async fn oldest_lines_are_evicted() -> anyhow::Result<()> {
    let harness = Harness::start().await?;
    let mut client = TcpStream::connect(harness.addr).await?;

    let mut log = String::new();
    for line in 0..RING_CAPACITY {
        log.push_str(&format!("{line}\n"));
        exchange(&mut client, format!("{line}\n").as_bytes(), log.as_bytes()).await?;
    }

    let expected: String = (1..=RING_CAPACITY).map(|line| format!("{line}\n")).collect();
    exchange(&mut client, format!("{RING_CAPACITY}\n").as_bytes(), expected.as_bytes()).await?;

    let cancel = CancellationToken::new();
    assert_eq!(harness.ring.len(&cancel)?, RING_CAPACITY);

    drop(client);
    harness.stop().await
}

#[tokio::test]
async fn seek_to_command() -> anyhow::Result<()> {
    let harness = Harness::start().await?;
    let mut client = TcpStream::connect(harness.addr).await?;

    exchange(&mut client, b"zero\n", b"zero\n").await?;
    exchange(&mut client, b"one\n", b"zero\none\n").await?;
    exchange(&mut client, b"two\n", b"zero\none\ntwo\n").await?;

    // Seek replies start at the requested byte and the control line is not retained.
    exchange(&mut client, b"AESDCHAR_IOCSEEKTO:1,1\n", b"ne\ntwo\n").await?;
    exchange(&mut client, b"AESDCHAR_IOCSEEKTO:2,0\n", b"two\n").await?;

    // Invalid seeks get no reply, the next line proves the connection is still served.
    client.write_all(b"AESDCHAR_IOCSEEKTO:7,0\n").await?;
    exchange(&mut client, b"three\n", b"zero\none\ntwo\nthree\n").await?;

    let cancel = CancellationToken::new();
    assert_eq!(harness.ring.len(&cancel)?, 4);

    drop(client);
    harness.stop().await
}

#[tokio::test]
async fn shutdown_closes_connections() -> anyhow::Result<()> {
    let harness = Harness::start().await?;
    let mut client = TcpStream::connect(harness.addr).await?;
    exchange(&mut client, b"bye\n", b"bye\n").await?;

    // Server stops even though the client is still connected.
    harness.stop().await?;

    let mut buf = [0; 8];
    let read = timeout(Duration::from_secs(5), client.read(&mut buf)).await?;
    assert!(matches!(read, Ok(0) | Err(_)));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn shutdown_with_unread_reply() -> anyhow::Result<()> {
    let harness = Harness::start().await?;
    let mut client = TcpStream::connect(harness.addr).await?;

    // Echo of this line is far larger than socket buffers, and nobody reads it.
    let mut line = vec![b'x'; 32 << 20];
    line.push(b'\n');
    client.write_all(&line).await?;
    tokio::time::sleep(Duration::from_secs(1)).await;

    // Server stops even though the reply is stuck.
    harness.stop().await?;
    drop(client);
    Ok(())
}
