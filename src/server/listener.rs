use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::TlsAcceptor;
use tracing::{debug, error, info, warn};

use crate::cgi::CgiHandler;
use crate::config::Config;
use crate::gemini::connection::{CompletionLog, Connection};
use crate::gemini::handler::{Handler, Router};
use crate::handlers::{InfoPage, QueryPrompt};
use crate::server::deadline::Deadlines;
use crate::server::tls;

/// Per-connection limits applied before the TLS handshake starts.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConnectionSettings {
    pub read_timeout: Duration,
    pub write_timeout: Duration,
}

impl ConnectionSettings {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            read_timeout: cfg.server.read_timeout(),
            write_timeout: cfg.server.write_timeout(),
        }
    }
}

/// Wires the built-in handlers and, when configured, the gateway.
pub fn build_router(cfg: &Config) -> anyhow::Result<Router> {
    let mut router = Router::new()
        .route("/info", Arc::new(InfoPage::new(cfg.server.software.clone())))
        .route(
            "/example",
            Arc::new(QueryPrompt::new("what is the answer to the ultimate question")),
        );

    if let Some(cgi) = &cfg.cgi {
        let handler = CgiHandler::new(&cgi.root, cgi.mount.clone(), cfg.server.identity())
            .with_context(|| format!("CGI root {} is not usable", cgi.root.display()))?;
        info!(root = %handler.root().display(), mount = %cgi.mount, "CGI gateway mounted");
        router = router.route(cgi.mount.clone(), Arc::new(handler));
    }

    Ok(router)
}

pub async fn run(cfg: &Config) -> anyhow::Result<()> {
    let tls_config = tls::load_tls_config(&cfg.server.cert, &cfg.server.key)?;
    let router = build_router(cfg)?;

    let listener = TcpListener::bind(&cfg.server.listen_addr)
        .await
        .with_context(|| format!("failed to bind to {}", cfg.server.listen_addr))?;
    info!(
        address = %listener.local_addr()?,
        cert = %cfg.server.cert.display(),
        key = %cfg.server.key.display(),
        "server listening"
    );

    serve(
        listener,
        tls::acceptor(tls_config),
        ConnectionSettings::from_config(cfg),
        Arc::new(router),
    )
    .await
}

/// Accepts connections forever, one task per connection.
pub async fn serve(
    listener: TcpListener,
    acceptor: TlsAcceptor,
    settings: ConnectionSettings,
    handler: Arc<dyn Handler>,
) -> anyhow::Result<()> {
    loop {
        let (socket, peer) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                error!(error = %e, "failed to accept connection");
                continue;
            }
        };
        debug!(peer = %peer, "connection accepted");

        let acceptor = acceptor.clone();
        let handler = Arc::clone(&handler);
        tokio::spawn(async move {
            if let Err(e) = handle_socket(socket, acceptor, settings, handler).await {
                warn!(peer = %peer, error = %e, "connection closed with error");
            }
        });
    }
}

async fn handle_socket(
    socket: TcpStream,
    acceptor: TlsAcceptor,
    settings: ConnectionSettings,
    handler: Arc<dyn Handler>,
) -> anyhow::Result<()> {
    let peer = socket.peer_addr()?;
    let local = socket.local_addr()?;

    let mut log = CompletionLog::start(peer, local);
    let socket = Deadlines::new(socket, settings.read_timeout, settings.write_timeout);
    let stream = match acceptor.accept(socket).await {
        Ok(stream) => stream,
        Err(e) => {
            log.abort(format!("TLS handshake failed: {e}"));
            return Err(e).context("TLS handshake failed");
        }
    };

    Connection::new(stream, peer, local, handler)
        .with_log(log)
        .run()
        .await;
    Ok(())
}
