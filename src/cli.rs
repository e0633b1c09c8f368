//! Command-line surface: a single `--config.file` flag, defaulting to
//! `./prom_to_click.yml`, plus the `-h`/`--help` and `-V`/`--version`
//! output clap derives for free.

use clap::Parser;
use std::path::PathBuf;

const DEFAULT_CONFIG_PATH: &str = "./prom_to_click.yml";

/// Translates Prometheus remote-read/remote-write traffic into SQL
/// against a columnar analytical backend.
#[derive(Parser)]
#[command(name = "prom-click-adapter")]
#[command(version)]
#[command(about = "Prometheus remote storage adapter for ClickHouse", long_about = None)]
pub struct Cli {
    /// Path to the YAML configuration file.
    #[arg(long = "config.file", default_value = DEFAULT_CONFIG_PATH)]
    pub config_file: PathBuf,
}
