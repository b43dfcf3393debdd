//! Per-connection read and write deadlines.
//!
//! Tokio sockets have no deadline setting, so the stream is wrapped and every
//! poll first checks a timer that was armed when the connection was accepted.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::time::{Sleep, sleep};

use crate::gemini::connection::Transport;

/// A stream whose reads fail after one instant and writes after another.
///
/// A zero timeout leaves that direction unbounded. An expired deadline
/// surfaces as `ErrorKind::TimedOut`.
pub struct Deadlines<S> {
    inner: S,
    read: Option<Pin<Box<Sleep>>>,
    write: Option<Pin<Box<Sleep>>>,
}

impl<S> Deadlines<S> {
    pub fn new(inner: S, read_timeout: Duration, write_timeout: Duration) -> Self {
        Self {
            inner,
            read: arm(read_timeout),
            write: arm(write_timeout),
        }
    }

    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

fn arm(timeout: Duration) -> Option<Pin<Box<Sleep>>> {
    if timeout.is_zero() {
        None
    } else {
        Some(Box::pin(sleep(timeout)))
    }
}

fn expired(deadline: &mut Option<Pin<Box<Sleep>>>, cx: &mut Context<'_>, what: &str) -> io::Result<()> {
    if let Some(timer) = deadline {
        if timer.as_mut().poll(cx).is_ready() {
            return Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("{what} deadline exceeded"),
            ));
        }
    }
    Ok(())
}

impl<S: AsyncRead + Unpin> AsyncRead for Deadlines<S> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = &mut *self;
        if let Err(e) = expired(&mut this.read, cx, "read") {
            return Poll::Ready(Err(e));
        }
        Pin::new(&mut this.inner).poll_read(cx, buf)
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for Deadlines<S> {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = &mut *self;
        if let Err(e) = expired(&mut this.write, cx, "write") {
            return Poll::Ready(Err(e));
        }
        Pin::new(&mut this.inner).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = &mut *self;
        if let Err(e) = expired(&mut this.write, cx, "write") {
            return Poll::Ready(Err(e));
        }
        Pin::new(&mut this.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = &mut *self;
        if let Err(e) = expired(&mut this.write, cx, "write") {
            return Poll::Ready(Err(e));
        }
        Pin::new(&mut this.inner).poll_shutdown(cx)
    }
}

impl<S: Transport> Transport for Deadlines<S> {
    fn peer_certificate(&self) -> Option<Vec<u8>> {
        self.inner.peer_certificate()
    }
}
