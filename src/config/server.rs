//! `server:` section — HTTP bind address and request timeout.

use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:9201".parse().expect("static default parses"),
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct FileServerConfig {
    pub addr: Option<String>,
    pub timeout: Option<u64>,
}

impl ServerConfig {
    pub fn from_file(file: Option<FileServerConfig>) -> anyhow::Result<Self> {
        let defaults = Self::default();
        let Some(file) = file else {
            return Ok(defaults);
        };

        let addr = match file.addr {
            Some(addr) => addr
                .parse()
                .map_err(|e| anyhow::anyhow!("server.addr '{addr}' is not a valid address: {e}"))?,
            None => defaults.addr,
        };
        let timeout = file
            .timeout
            .map(Duration::from_secs)
            .unwrap_or(defaults.timeout);

        Ok(Self { addr, timeout })
    }
}
