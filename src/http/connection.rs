//! Connection stream that can answer with raw bytes instead of an HTTP response.
//!
//! hyper always frames what it writes, so raw responses bypass it at the IO
//! layer: the request handler stores the bytes in a [`RawReply`] and the
//! stream writes them in place of the next response hyper produces. Whatever
//! hyper writes after that is discarded.

use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{ready, Context, Poll};

use bytes::{Buf, Bytes};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;

/// Slot shared by one connection's stream and its request handler.
#[derive(Debug, Clone, Default)]
pub(crate) struct RawReply(Arc<Mutex<Option<Bytes>>>);

impl RawReply {
    /// Replace the next response on this connection with `bytes`.
    pub(crate) fn set(&self, bytes: Bytes) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = Some(bytes);
    }

    fn take(&self) -> Option<Bytes> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).take()
    }
}

enum Output {
    Http,
    Raw(Bytes),
    Discard,
}

/// TCP stream whose output switches to raw bytes once a [`RawReply`] is set.
pub(crate) struct RawStream {
    inner: TcpStream,
    reply: RawReply,
    output: Output,
}

impl RawStream {
    pub(crate) fn new(inner: TcpStream, reply: RawReply) -> Self {
        Self { inner, reply, output: Output::Http }
    }
}

impl AsyncRead for RawStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_read(cx, buf)
    }
}

impl AsyncWrite for RawStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        if matches!(this.output, Output::Http) {
            if let Some(raw) = this.reply.take() {
                this.output = Output::Raw(raw);
            }
        }

        loop {
            match &mut this.output {
                Output::Http => return Pin::new(&mut this.inner).poll_write(cx, buf),
                Output::Discard => return Poll::Ready(Ok(buf.len())),
                Output::Raw(raw) => {
                    if raw.has_remaining() {
                        let written = ready!(Pin::new(&mut this.inner).poll_write(cx, &raw[..]))?;
                        if written == 0 {
                            return Poll::Ready(Err(io::ErrorKind::WriteZero.into()));
                        }
                        raw.advance(written);
                        continue;
                    }
                }
            }
            this.output = Output::Discard;
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;

    async fn pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("address");
        let client = TcpStream::connect(addr).await.expect("connect");
        let (server, _) = listener.accept().await.expect("accept");
        (server, client)
    }

    /// Test writes pass through untouched until a raw reply is set.
    #[tokio::test]
    async fn test_raw_reply_replaces_output() {
        let (server, mut client) = pair().await;
        let reply = RawReply::default();
        let mut stream = RawStream::new(server, reply.clone());

        stream.write_all(b"first ").await.expect("write");
        reply.set(Bytes::from_static(b"raw bytes"));
        stream.write_all(b"HTTP/1.1 200 OK\r\n\r\n").await.expect("write is discarded");
        stream.write_all(b"more").await.expect("write is discarded");
        stream.shutdown().await.expect("shutdown");

        let mut received = Vec::new();
        client.read_to_end(&mut received).await.expect("read");
        assert_eq!(received, b"first raw bytes");
    }
}
