use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, DuplexStream};
use tokio::net::TcpStream;
use tracing::{debug, info};

use crate::gemini::handler::Handler;
use crate::gemini::parser::read_request;
use crate::gemini::response::Response;
use crate::gemini::status::Status;

/// A byte stream that may be able to name the client's certificate.
///
/// TLS streams report the certificate the client presented; plain streams
/// (and in-memory test pipes) never have one.
pub trait Transport: AsyncRead + AsyncWrite + Unpin + Send {
    /// DER encoding of the first certificate the peer presented, if any.
    fn peer_certificate(&self) -> Option<Vec<u8>> {
        None
    }
}

impl Transport for TcpStream {}

impl Transport for DuplexStream {}

/// What a handler may know about the connection it is answering.
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    pub peer_addr: SocketAddr,
    pub local_addr: SocketAddr,
    /// DER bytes of the client certificate
    pub client_certificate: Option<Vec<u8>>,
}

impl ConnectionInfo {
    pub fn new(
        peer_addr: SocketAddr,
        local_addr: SocketAddr,
        client_certificate: Option<Vec<u8>>,
    ) -> Self {
        Self {
            peer_addr,
            local_addr,
            client_certificate,
        }
    }
}

/// Emits the one completion line per connection when dropped, whichever way
/// the connection ended.
///
/// The listener starts one before the TLS handshake so a failed handshake is
/// recorded too; [`Connection::with_log`] carries it on from there.
pub struct CompletionLog {
    peer: SocketAddr,
    local: SocketAddr,
    started: Instant,
    target: Option<String>,
    status: Option<Status>,
    meta: String,
}

impl CompletionLog {
    pub fn start(peer: SocketAddr, local: SocketAddr) -> Self {
        Self {
            peer,
            local,
            started: Instant::now(),
            target: None,
            status: None,
            meta: String::new(),
        }
    }

    /// Records why the connection ended before a status could be sent.
    pub fn abort(&mut self, reason: impl Into<String>) {
        self.meta = reason.into();
    }
}

impl Drop for CompletionLog {
    fn drop(&mut self) {
        info!(
            peer = %self.peer,
            local = %self.local,
            target = self.target.as_deref().unwrap_or("-"),
            elapsed = ?self.started.elapsed(),
            status = self.status.map(|s| s.as_u16()),
            meta = %self.meta,
            "request complete"
        );
    }
}

/// One accepted connection: decode a single request, dispatch it, close.
pub struct Connection<T> {
    stream: T,
    info: ConnectionInfo,
    handler: Arc<dyn Handler>,
    log: Option<CompletionLog>,
}

impl<T: Transport> Connection<T> {
    pub fn new(
        stream: T,
        peer_addr: SocketAddr,
        local_addr: SocketAddr,
        handler: Arc<dyn Handler>,
    ) -> Self {
        let client_certificate = stream.peer_certificate();
        Self {
            stream,
            info: ConnectionInfo::new(peer_addr, local_addr, client_certificate),
            handler,
            log: None,
        }
    }

    /// Continues a log started earlier, typically before the handshake.
    pub fn with_log(mut self, log: CompletionLog) -> Self {
        self.log = Some(log);
        self
    }

    pub fn info(&self) -> &ConnectionInfo {
        &self.info
    }

    /// Serves the connection to completion and closes it.
    ///
    /// Errors never escape: they end up as a status line when one can still
    /// be sent, and in the completion log either way.
    pub async fn run(mut self) {
        let mut log = self
            .log
            .take()
            .unwrap_or_else(|| CompletionLog::start(self.info.peer_addr, self.info.local_addr));
        let decoded = read_request(&mut self.stream).await;

        {
            let mut response = Response::new(&mut self.stream, &self.info);

            match decoded {
                Ok(request) => {
                    log.target = Some(request.url.to_string());
                    self.handler.serve(&mut response, &request).await;
                }
                Err(e) => {
                    debug!(peer = %self.info.peer_addr, error = %e, "rejecting request");
                    if let Err(write_err) = response.set_status(e.status(), e.meta()).await {
                        debug!(peer = %self.info.peer_addr, error = %write_err, "failed to send status");
                    }
                }
            }

            log.status = response.status();
            log.meta = response.meta().to_string();
        }

        if let Err(e) = self.stream.shutdown().await {
            debug!(peer = %self.info.peer_addr, error = %e, "error closing connection");
        }
    }
}
