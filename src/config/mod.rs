//! Layered configuration: a YAML file merged over hardcoded defaults.
//!
//! This crate's only configuration surface is the file named by
//! `--config.file` (default `./prom_to_click.yml`); there is no
//! environment-variable layer. A missing or malformed file is fatal.

mod clickhouse;
mod logger;
mod reader;
mod server;
mod writer;

#[cfg(test)]
mod tests;

pub use clickhouse::ClickhouseServerConfig;
pub use logger::LoggerConfig;
pub use reader::{ReaderConfig, ReaderMode};
pub use server::ServerConfig;
pub use writer::WriterConfig;

use clickhouse::FileClickhouseServerConfig;
use logger::FileLoggerConfig;
use reader::FileReaderConfig;
use serde::Deserialize;
use server::FileServerConfig;
use std::collections::HashMap;
use std::path::Path;
use writer::FileWriterConfig;

/// Fully resolved configuration, defaults applied.
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub clickhouse_servers: HashMap<String, ClickhouseServerConfig>,
    pub reader: ReaderConfig,
    pub writer: WriterConfig,
    pub logger: LoggerConfig,
}

/// Mirrors the YAML shape; every field is optional so a partial file
/// is legal and unset sections fall back to their module's defaults.
#[derive(Debug, Deserialize, Default)]
struct RawConfig {
    server: Option<FileServerConfig>,
    #[serde(default)]
    clickhouse_servers: HashMap<String, FileClickhouseServerConfig>,
    reader: Option<FileReaderConfig>,
    writer: Option<FileWriterConfig>,
    logger: Option<FileLoggerConfig>,
}

impl Config {
    /// Builds a [`Config`] from an already-parsed [`RawConfig`].
    fn from_raw(raw: RawConfig) -> anyhow::Result<Self> {
        Ok(Self {
            server: ServerConfig::from_file(raw.server)?,
            clickhouse_servers: clickhouse::from_file_map(raw.clickhouse_servers),
            reader: ReaderConfig::from_file(raw.reader)?,
            writer: WriterConfig::from_file(raw.writer),
            logger: LoggerConfig::from_file(raw.logger),
        })
    }

    /// Reads and parses the config file at `path`, applying defaults for
    /// anything it omits.
    ///
    /// On any failure (missing file, invalid YAML, invalid field value)
    /// this prints the error and terminates the process with exit code 1,
    /// matching the "Config invalid -> Fatal, abort process" contract.
    pub fn load(path: &Path) -> Self {
        match Self::try_load(path) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("fatal: failed to load config from {}: {err:#}", path.display());
                std::process::exit(1);
            }
        }
    }

    fn try_load(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("reading {}: {e}", path.display()))?;
        let raw: RawConfig = serde_yaml::from_str(&contents)
            .map_err(|e| anyhow::anyhow!("parsing {}: {e}", path.display()))?;
        Self::from_raw(raw)
    }
}
