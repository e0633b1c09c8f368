//! `clickhouse_servers:` section — one entry per named backend.

use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// Resolved configuration for a single named ClickHouse backend.
#[derive(Debug, Clone)]
pub struct ClickhouseServerConfig {
    /// A preconfigured full DSN. When present, it bypasses the builder
    /// below entirely.
    pub dsn: Option<String>,
    pub host: String,
    pub user: String,
    pub passwd: String,
    pub database: String,
    pub table: String,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
    pub alt_hosts: Vec<String>,
}

impl Default for ClickhouseServerConfig {
    fn default() -> Self {
        Self {
            dsn: None,
            host: "127.0.0.1:8123".to_string(),
            user: "default".to_string(),
            passwd: String::new(),
            database: "default".to_string(),
            table: "prom_samples".to_string(),
            read_timeout: Duration::from_secs(10),
            write_timeout: Duration::from_secs(10),
            alt_hosts: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct FileClickhouseServerConfig {
    pub dsn: Option<String>,
    pub host: Option<String>,
    pub user: Option<String>,
    pub passwd: Option<String>,
    pub database: Option<String>,
    pub table: Option<String>,
    pub read_timeout: Option<u64>,
    pub write_timeout: Option<u64>,
    #[serde(default)]
    pub alt_hosts: Vec<String>,
}

impl ClickhouseServerConfig {
    fn from_file(file: FileClickhouseServerConfig) -> Self {
        let defaults = Self::default();
        Self {
            dsn: file.dsn,
            host: file.host.unwrap_or(defaults.host),
            user: file.user.unwrap_or(defaults.user),
            passwd: file.passwd.unwrap_or(defaults.passwd),
            database: file.database.unwrap_or(defaults.database),
            table: file.table.unwrap_or(defaults.table),
            read_timeout: file
                .read_timeout
                .map(Duration::from_secs)
                .unwrap_or(defaults.read_timeout),
            write_timeout: file
                .write_timeout
                .map(Duration::from_secs)
                .unwrap_or(defaults.write_timeout),
            alt_hosts: file.alt_hosts,
        }
    }

    /// Builds the HTTP-interface URL the `clickhouse` crate's
    /// `Client::with_url` expects (`http://host:8123`), or returns the
    /// preconfigured `dsn` verbatim if one was given. User, password,
    /// and database are applied separately via `Client::with_user` /
    /// `with_password` / `with_database`, not embedded in the URL.
    pub fn build_dsn(&self) -> String {
        if let Some(dsn) = &self.dsn {
            return dsn.clone();
        }

        if self.host.starts_with("http://") || self.host.starts_with("https://") {
            self.host.clone()
        } else {
            format!("http://{}", self.host)
        }
    }
}

pub fn from_file_map(
    file: HashMap<String, FileClickhouseServerConfig>,
) -> HashMap<String, ClickhouseServerConfig> {
    file.into_iter()
        .map(|(name, cfg)| (name, ClickhouseServerConfig::from_file(cfg)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preconfigured_dsn_bypasses_builder() {
        let mut cfg = ClickhouseServerConfig::default();
        cfg.dsn = Some("tcp://explicit/dsn".to_string());
        assert_eq!(cfg.build_dsn(), "tcp://explicit/dsn");
    }

    #[test]
    fn builder_prefixes_bare_host_with_http_scheme() {
        let mut cfg = ClickhouseServerConfig::default();
        cfg.host = "clickhouse.internal:8123".to_string();
        assert_eq!(cfg.build_dsn(), "http://clickhouse.internal:8123");
    }

    #[test]
    fn builder_leaves_an_explicit_scheme_alone() {
        let mut cfg = ClickhouseServerConfig::default();
        cfg.host = "https://clickhouse.internal:8443".to_string();
        assert_eq!(cfg.build_dsn(), "https://clickhouse.internal:8443");
    }
}
