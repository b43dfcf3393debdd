//! Running gateway programs.

use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use bytes::Bytes;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::cgi::env::Environment;

/// Wall-clock limit for one gateway program.
pub const CGI_TIMEOUT: Duration = Duration::from_secs(10);

const DIRECTIVE_MARKER: &str = "#!";

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("failed to start {}: {source}", program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("exceeded the {0:?} runtime limit")]
    TimedOut(Duration),

    #[error("exited with {status}")]
    Failed { status: ExitStatus, stderr: String },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// The program and arguments actually started for a script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl Invocation {
    /// Executes the script itself.
    pub fn direct(script: &Path) -> Self {
        Self {
            program: script.to_path_buf(),
            args: Vec::new(),
        }
    }

    /// Runs the interpreter named on the script's `#!` line, for platforms
    /// that cannot execute scripts natively.
    ///
    /// Only one argument after the interpreter is honoured. A script without
    /// a directive line is executed directly.
    pub fn from_directive(script: &Path) -> io::Result<Self> {
        let contents = std::fs::read(script)?;
        let first_line = contents.split(|b| *b == b'\n').next().unwrap_or_default();
        let first_line = String::from_utf8_lossy(first_line);

        Ok(match parse_interpreter_directive(&first_line) {
            Some((interpreter, argument)) => {
                let mut args: Vec<String> = argument.into_iter().collect();
                args.push(script.display().to_string());
                Self {
                    program: PathBuf::from(interpreter),
                    args,
                }
            }
            None => Self::direct(script),
        })
    }

    /// Picks direct execution where the OS understands `#!`, the directive
    /// fallback elsewhere.
    pub fn for_script(script: &Path) -> io::Result<Self> {
        if cfg!(unix) {
            Ok(Self::direct(script))
        } else {
            Self::from_directive(script)
        }
    }
}

/// Splits `#!interpreter argument` into its interpreter and single argument.
///
/// # Example
///
/// ```
/// # use nightjar::cgi::process::parse_interpreter_directive;
/// assert_eq!(
///     parse_interpreter_directive("#!/usr/bin/env python3"),
///     Some(("/usr/bin/env".to_string(), Some("python3".to_string())))
/// );
/// assert_eq!(parse_interpreter_directive("print('hi')"), None);
/// ```
pub fn parse_interpreter_directive(line: &str) -> Option<(String, Option<String>)> {
    let directive = line
        .strip_prefix(DIRECTIVE_MARKER)?
        .trim_start()
        .trim_end_matches('\r');

    match directive.split_once(' ') {
        Some((interpreter, argument)) if !argument.is_empty() => {
            Some((interpreter.to_string(), Some(argument.to_string())))
        }
        Some((interpreter, _)) => Some((interpreter.to_string(), None)),
        None if directive.is_empty() => None,
        None => Some((directive.to_string(), None)),
    }
}

/// Runs `invocation` with exactly `env` as its environment and returns
/// what it wrote to stdout.
///
/// `stdin` is streamed to the child when given; otherwise the child reads
/// from null. The child is killed if it outlives `limit`.
pub async fn run(
    invocation: &Invocation,
    env: &Environment,
    stdin: Option<Bytes>,
    limit: Duration,
) -> Result<Vec<u8>, GatewayError> {
    let mut command = Command::new(&invocation.program);
    command
        .args(&invocation.args)
        .env_clear()
        .envs(env)
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    // Own process group, so a timeout takes the program's children down too.
    #[cfg(unix)]
    command.process_group(0);

    let mut child = command.spawn().map_err(|source| GatewayError::Spawn {
        program: invocation.program.clone(),
        source,
    })?;

    if let (Some(payload), Some(mut pipe)) = (stdin, child.stdin.take()) {
        tokio::spawn(async move {
            if let Err(e) = pipe.write_all(&payload).await {
                tracing::debug!(error = %e, "CGI program did not consume its input");
            }
        });
    }

    let pid = child.id();

    // Dropping the child on timeout kills it; the group kill catches the rest.
    let output = match tokio::time::timeout(limit, child.wait_with_output()).await {
        Ok(result) => result?,
        Err(_) => {
            kill_process_group(pid);
            return Err(GatewayError::TimedOut(limit));
        }
    };

    if !output.status.success() {
        return Err(GatewayError::Failed {
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }

    Ok(output.stdout)
}

#[cfg(unix)]
fn kill_process_group(pid: Option<u32>) {
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let Some(pid) = pid else { return };
    match killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => tracing::warn!(pid, error = %e, "failed to kill CGI process group"),
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: Option<u32>) {}
