//! Dynamic content gateway.
//!
//! Maps request paths under a mount prefix onto programs in a root
//! directory, runs the program with CGI-style environment variables, and
//! relays its `<status> <meta>\r\n<body>` output to the client.
//!
//! - **`env`**: builds the per-request environment, client certificate included
//! - **`process`**: starts the program with a runtime limit
//! - **`output`**: validates and splits the program's header line

pub mod env;
pub mod output;
pub mod process;

use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use percent_encoding::percent_decode_str;
use tracing::{error, warn};

use crate::config::ServerIdentity;
use crate::gemini::handler::Handler;
use crate::gemini::request::Request;
use crate::gemini::response::Response;
use crate::gemini::status::Status;

use self::output::parse_output;
use self::process::{CGI_TIMEOUT, GatewayError, Invocation};

/// The resolved path fell outside the gateway root.
#[derive(Debug, PartialEq, Eq)]
pub struct OutOfScope;

/// Serves requests by executing programs from a directory.
pub struct CgiHandler {
    root: PathBuf,
    mount: String,
    identity: ServerIdentity,
    timeout: Duration,
}

impl CgiHandler {
    /// Creates a gateway for programs under `root`, reached through URL
    /// paths starting with `mount`.
    ///
    /// Fails if `root` cannot be canonicalized.
    pub fn new(root: &Path, mount: impl Into<String>, identity: ServerIdentity) -> io::Result<Self> {
        let mount = mount.into();
        Ok(Self {
            root: root.canonicalize()?,
            mount: mount.trim_end_matches('/').to_string(),
            identity,
            timeout: CGI_TIMEOUT,
        })
    }

    /// Overrides the runtime limit.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps a URL path to a file under the root.
    ///
    /// The path is percent-decoded, stripped of the mount prefix, joined onto
    /// the root and canonicalized. Paths that do not exist are normalized
    /// lexically instead. Either way the result must stay under the root.
    pub fn resolve(&self, url_path: &str) -> Result<PathBuf, OutOfScope> {
        let decoded = percent_decode_str(url_path).decode_utf8_lossy();
        let relative = decoded
            .strip_prefix(self.mount.as_str())
            .unwrap_or(&*decoded)
            .trim_start_matches('/');

        let joined = self.root.join(relative);
        let resolved = joined.canonicalize().unwrap_or_else(|_| normalize(&joined));

        if resolved.starts_with(&self.root) {
            Ok(resolved)
        } else {
            Err(OutOfScope)
        }
    }

    async fn respond(&self, response: &mut Response<'_>, request: &Request) -> io::Result<()> {
        let script = match self.resolve(request.path()) {
            Ok(script) => script,
            Err(OutOfScope) => {
                warn!(path = request.path(), "request path escapes the gateway root");
                return response
                    .set_status(Status::TemporaryFailure, "Path not in scope!")
                    .await;
            }
        };

        let metadata = match tokio::fs::metadata(&script).await {
            Ok(metadata) => metadata,
            Err(_) => return response.set_status(Status::NotFound, "File Not Found!").await,
        };
        if !world_readable(&metadata) {
            return response.set_status(Status::Gone, "Forbidden!").await;
        }

        let invocation = match Invocation::for_script(&script) {
            Ok(invocation) => invocation,
            Err(e) => {
                error!(script = %script.display(), error = %e, "cannot read CGI program");
                return response.set_status(Status::CgiError, "CGI error!").await;
            }
        };

        let env = env::build(request, response.connection(), &self.identity, &script);
        let stdin = request
            .scheme
            .carries_payload()
            .then(|| request.payload.clone());

        let stdout = match process::run(&invocation, &env, stdin, self.timeout).await {
            Ok(stdout) => stdout,
            Err(GatewayError::TimedOut(limit)) => {
                warn!(script = %script.display(), ?limit, "terminating CGI process");
                return response
                    .set_status(Status::CgiError, "CGI process timed out!")
                    .await;
            }
            Err(GatewayError::Failed { status, stderr }) => {
                error!(script = %script.display(), %status, stderr = %stderr.trim_end(), "CGI program failed");
                return response.set_status(Status::CgiError, "CGI error!").await;
            }
            Err(e) => {
                error!(script = %script.display(), error = %e, "error running CGI program");
                return response.set_status(Status::CgiError, "CGI error!").await;
            }
        };

        relay(response, &stdout, &script).await
    }
}

#[async_trait]
impl Handler for CgiHandler {
    async fn serve(&self, response: &mut Response<'_>, request: &Request) {
        if let Err(e) = self.respond(response, request).await {
            tracing::debug!(
                peer = %response.connection().peer_addr,
                error = %e,
                "failed to write CGI response"
            );
        }
    }
}

/// Forwards a program's header as the response status and the rest as body.
async fn relay(response: &mut Response<'_>, stdout: &[u8], script: &Path) -> io::Result<()> {
    let parsed = match parse_output(stdout) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!(script = %script.display(), error = %e, "CGI program sent an invalid header");
            return response.set_status(Status::CgiError, e.client_meta()).await;
        }
    };

    response.set_status(parsed.status, parsed.meta).await?;
    if !parsed.body.is_empty() {
        response.write(parsed.body).await?;
    }
    Ok(())
}

#[cfg(unix)]
fn world_readable(metadata: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o444 == 0o444
}

#[cfg(not(unix))]
fn world_readable(_metadata: &std::fs::Metadata) -> bool {
    true
}

/// Resolves `.` and `..` without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}
