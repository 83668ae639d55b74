//! Byte channel consumed by the handshake.

use std::future::Future;
use std::io;

use bytes::{Bytes, BytesMut};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::{timeout_at, Instant};

/// Failed exact read.
#[derive(Error, Debug)]
pub enum ReadError {
    /// Transport failure, including EOF before `n` bytes arrived
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Deadline elapsed first
    #[error("deadline elapsed before read completed")]
    TimedOut,
}

/// Minimal duplex contract the handshake depends on.
///
/// Implemented for every tokio `AsyncRead + AsyncWrite` stream, so a
/// `TcpStream`, a TLS stream or an in-memory `DuplexStream` all work.
pub trait HandshakeChannel: Send {
    /// Write and flush all of `bytes`.
    fn write_bytes(&mut self, bytes: &[u8]) -> impl Future<Output = io::Result<()>> + Send;

    /// Read exactly `n` bytes, giving up at `deadline`.
    fn read_exactly(
        &mut self,
        n: usize,
        deadline: Instant,
    ) -> impl Future<Output = Result<Bytes, ReadError>> + Send;

    /// Close the write side so the peer sees the attempt abandoned.
    fn close(&mut self) -> impl Future<Output = io::Result<()>> + Send;
}

impl<T> HandshakeChannel for T
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
        AsyncWriteExt::write_all(self, bytes).await?;
        AsyncWriteExt::flush(self).await
    }

    async fn read_exactly(&mut self, n: usize, deadline: Instant) -> Result<Bytes, ReadError> {
        let mut buf = BytesMut::zeroed(n);
        match timeout_at(deadline, AsyncReadExt::read_exact(self, &mut buf)).await {
            Ok(Ok(_)) => Ok(buf.freeze()),
            Ok(Err(e)) => Err(ReadError::Io(e)),
            Err(_) => Err(ReadError::TimedOut),
        }
    }

    async fn close(&mut self) -> io::Result<()> {
        AsyncWriteExt::shutdown(self).await
    }
}
