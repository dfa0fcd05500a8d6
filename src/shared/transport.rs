//! Frame transport over byte streams.
//!
//! [`Transport`] is the seam between protocol logic and sockets: the worker
//! runtime and the coordinator's dispatch phase only see `send` and
//! `receive` of [`Envelope`]s. [`Connection`] implements it for any
//! [`PeerStream`] (TCP in production, an in-memory duplex in tests) and can
//! be split into a [`FrameReader`] and a [`FrameWriter`] for relaying.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bytes::BytesMut;
use futures::FutureExt;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};

use crate::error::{Result, TransportError};

use super::codec::{Payload, PayloadKind};
use super::frame::{check_frame_len, Address, Envelope};

/// Frame transport between one worker and the coordinator.
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    /// Sends one envelope.
    async fn send(&mut self, envelope: Envelope) -> Result<()>;

    /// Receives the next envelope.
    async fn receive(&mut self) -> Result<Envelope>;

    /// Closes the transport. Later sends and receives fail with
    /// [`TransportError::ConnectionClosed`].
    async fn close(&mut self) -> Result<()>;

    /// Whether the peer still appears connected.
    fn is_connected(&self) -> bool;

    /// Short transport name for logs.
    fn transport_type(&self) -> &'static str {
        "unknown"
    }

    /// Encodes `payload` and sends it to `address`.
    async fn send_payload(&mut self, address: Address, payload: &Payload) -> Result<()> {
        self.send(Envelope::new(address, payload.encode())).await
    }

    /// Receives one envelope and decodes its payload as `kind`.
    async fn receive_payload(&mut self, kind: PayloadKind) -> Result<(i32, Payload)> {
        let envelope = self.receive().await?;
        let payload = Payload::decode(kind, envelope.payload)?;
        Ok((envelope.target, payload))
    }
}

/// A byte stream a [`Connection`] can run over.
pub trait PeerStream: AsyncRead + AsyncWrite + Send + Sync + Unpin + 'static {
    /// Non-blocking liveness check. Must not consume data.
    fn is_peer_connected(&self) -> bool;

    /// Short stream name for logs.
    fn kind(&self) -> &'static str;
}

impl PeerStream for tokio::net::TcpStream {
    fn is_peer_connected(&self) -> bool {
        let mut byte = [0u8; 1];
        match self.peek(&mut byte).now_or_never() {
            // Nothing buffered: the peer is idle but connected.
            None => true,
            Some(Ok(0)) => false,
            Some(Ok(_)) => true,
            Some(Err(err)) => err.kind() == std::io::ErrorKind::WouldBlock,
        }
    }

    fn kind(&self) -> &'static str {
        "tcp"
    }
}

impl PeerStream for tokio::io::DuplexStream {
    fn is_peer_connected(&self) -> bool {
        true
    }

    fn kind(&self) -> &'static str {
        "duplex"
    }
}

/// Reads one frame from `reader`.
pub async fn read_frame<R>(reader: &mut R) -> Result<Envelope>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let len = reader.read_u32_le().await.map_err(TransportError::from_io)?;
    let len = check_frame_len(len)?;
    let mut body = BytesMut::zeroed(len);
    reader
        .read_exact(&mut body)
        .await
        .map_err(TransportError::from_io)?;
    Ok(Envelope::decode_body(body.freeze())?)
}

/// Writes one frame to `writer` and flushes it.
pub async fn write_frame<W>(writer: &mut W, envelope: &Envelope) -> Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let frame = envelope.encode();
    writer
        .write_all(&frame)
        .await
        .map_err(TransportError::from_io)?;
    writer.flush().await.map_err(TransportError::from_io)?;
    Ok(())
}

/// Read side of a split connection.
#[derive(Debug)]
pub struct FrameReader<R> {
    inner: R,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    /// Wraps a read half.
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// Reads the next frame.
    pub async fn read(&mut self) -> Result<Envelope> {
        read_frame(&mut self.inner).await
    }
}

/// Write side of a split connection. Each call writes one whole frame.
#[derive(Debug)]
pub struct FrameWriter<W> {
    inner: W,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    /// Wraps a write half.
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Writes one frame.
    pub async fn write(&mut self, envelope: &Envelope) -> Result<()> {
        write_frame(&mut self.inner, envelope).await
    }

    /// Shuts the write direction down.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.inner
            .shutdown()
            .await
            .map_err(TransportError::from_io)?;
        Ok(())
    }
}

/// Framed [`Transport`] over a [`PeerStream`].
///
/// # Examples
///
/// ```
/// use pla_compose::shared::{Address, Connection, Payload, PayloadKind, Transport};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> pla_compose::Result<()> {
/// let (a, b) = tokio::io::duplex(1024);
/// let mut left = Connection::new(a);
/// let mut right = Connection::new(b);
///
/// left.send_payload(Address::Worker(1), &Payload::Int(3)).await?;
/// let (target, payload) = right.receive_payload(PayloadKind::Int).await?;
/// assert_eq!(target, 1);
/// assert_eq!(payload, Payload::Int(3));
/// # Ok(())
/// # }
/// ```
pub struct Connection<S> {
    stream: S,
    closed: AtomicBool,
}

impl<S: PeerStream> Connection<S> {
    /// Wraps a connected stream.
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            closed: AtomicBool::new(false),
        }
    }

    /// Non-blocking check that the peer has not hung up.
    pub fn is_alive(&self) -> bool {
        !self.closed.load(Ordering::Acquire) && self.stream.is_peer_connected()
    }

    /// Splits into independently owned read and write sides.
    pub fn into_split(self) -> (FrameReader<ReadHalf<S>>, FrameWriter<WriteHalf<S>>) {
        let (read, write) = tokio::io::split(self.stream);
        (FrameReader::new(read), FrameWriter::new(write))
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::ConnectionClosed.into());
        }
        Ok(())
    }
}

impl<S> fmt::Debug for Connection<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<S: PeerStream> Transport for Connection<S> {
    async fn send(&mut self, envelope: Envelope) -> Result<()> {
        self.ensure_open()?;
        let result = write_frame(&mut self.stream, &envelope).await;
        if matches!(&result, Err(e) if e.is_connection_lost()) {
            self.closed.store(true, Ordering::Release);
        }
        result
    }

    async fn receive(&mut self) -> Result<Envelope> {
        self.ensure_open()?;
        let result = read_frame(&mut self.stream).await;
        if matches!(&result, Err(e) if e.is_connection_lost()) {
            self.closed.store(true, Ordering::Release);
        }
        result
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.stream
            .shutdown()
            .await
            .map_err(TransportError::from_io)?;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.is_alive()
    }

    fn transport_type(&self) -> &'static str {
        self.stream.kind()
    }
}
