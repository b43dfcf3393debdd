use std::io;

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::gemini::connection::ConnectionInfo;
use crate::gemini::status::Status;

/// MIME type used when a body is written before any status.
pub const DEFAULT_MIME: &str = "text/gemini";

/// Write side of a single exchange.
///
/// The first [`Response::set_status`] call (or the first body write) puts
/// the status line on the wire. Later status calls only change what gets
/// logged; the line already sent cannot be replaced.
pub struct Response<'a> {
    writer: &'a mut (dyn AsyncWrite + Unpin + Send),
    connection: &'a ConnectionInfo,
    committed: bool,
    status: Option<Status>,
    meta: String,
}

impl<'a> Response<'a> {
    pub fn new(
        writer: &'a mut (dyn AsyncWrite + Unpin + Send),
        connection: &'a ConnectionInfo,
    ) -> Self {
        Self {
            writer,
            connection,
            committed: false,
            status: None,
            meta: String::new(),
        }
    }

    /// Sends `"<code> <meta>\r\n"` unless a status line already went out.
    ///
    /// On a write error nothing is committed and the error is returned.
    pub async fn set_status(&mut self, status: Status, meta: impl Into<String>) -> io::Result<()> {
        let meta = meta.into();

        if !self.committed {
            let line = format!("{} {}\r\n", status.as_u16(), meta);
            self.writer.write_all(line.as_bytes()).await?;
            self.writer.flush().await?;
            self.committed = true;
        }

        self.status = Some(status);
        self.meta = meta;
        Ok(())
    }

    /// Writes body bytes verbatim, committing `20 text/gemini` first if needed.
    pub async fn write(&mut self, body: &[u8]) -> io::Result<usize> {
        if !self.committed {
            self.set_status(Status::Success, DEFAULT_MIME).await?;
        }

        self.writer.write_all(body).await?;
        self.writer.flush().await?;
        Ok(body.len())
    }

    pub fn is_committed(&self) -> bool {
        self.committed
    }

    /// Last recorded status, committed or not.
    pub fn status(&self) -> Option<Status> {
        self.status
    }

    pub fn meta(&self) -> &str {
        &self.meta
    }

    /// Addresses and client certificate of the connection being answered.
    pub fn connection(&self) -> &ConnectionInfo {
        self.connection
    }
}
