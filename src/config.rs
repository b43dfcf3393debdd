use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    /// Gateway settings; the gateway is not mounted when absent.
    pub cgi: Option<CgiConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub cert: PathBuf,
    pub key: PathBuf,
    /// Seconds a client gets to send its request; 0 disables the deadline.
    pub read_timeout_secs: u64,
    /// Seconds allowed for writing the response; 0 disables the deadline.
    pub write_timeout_secs: u64,
    /// Reported to gateway programs as `SERVER_SOFTWARE`.
    pub software: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CgiConfig {
    /// Directory holding the gateway programs.
    pub root: PathBuf,
    /// URL path prefix the gateway is mounted under.
    pub mount: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            cgi: Some(CgiConfig::default()),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "localhost:1965".to_string(),
            cert: PathBuf::from("cert.pem"),
            key: PathBuf::from("key.pem"),
            read_timeout_secs: 30,
            write_timeout_secs: 30,
            software: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl Default for CgiConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("cgi-bin"),
            mount: "/cgi-bin".to_string(),
        }
    }
}

impl Config {
    /// Loads the file named by `CONFIG` (defaults when unset), then lets
    /// `LISTEN` override the bind address.
    pub fn load() -> anyhow::Result<Self> {
        let mut cfg = match std::env::var("CONFIG") {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) => Self::default(),
        };

        if let Ok(listen_addr) = std::env::var("LISTEN") {
            cfg.server.listen_addr = listen_addr;
        }

        Ok(cfg)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_yaml(&raw).with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn from_yaml(raw: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(raw)?)
    }
}

impl ServerConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }

    /// Host and port the server reports to gateway programs.
    pub fn identity(&self) -> ServerIdentity {
        let (host, port) = match self.listen_addr.rsplit_once(':') {
            Some((host, port)) => (host, port),
            None => (self.listen_addr.as_str(), ""),
        };

        ServerIdentity {
            host: host.trim_start_matches('[').trim_end_matches(']').to_string(),
            port: port.to_string(),
            software: self.software.clone(),
        }
    }
}

/// How the server describes itself to gateway programs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerIdentity {
    pub host: String,
    pub port: String,
    pub software: String,
}
