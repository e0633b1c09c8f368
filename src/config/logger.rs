//! `logger:` section — dual console/file sinks with independent levels
//! and size/age/backup-count rotation, matching the original's
//! zap+lumberjack logger.

use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct LoggerConfig {
    pub dir: PathBuf,
    /// Megabytes before a log file is rotated.
    pub max_size: u64,
    pub max_backups: u32,
    /// Days a rotated file is retained.
    pub max_age: u32,
    pub compress: bool,
    pub level_console: String,
    pub level_file: String,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./logs"),
            max_size: 100,
            max_backups: 7,
            max_age: 7,
            compress: true,
            level_console: "info".to_string(),
            level_file: "info".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct FileLoggerConfig {
    pub dir: Option<String>,
    pub max_size: Option<u64>,
    pub max_backups: Option<u32>,
    pub max_age: Option<u32>,
    pub compress: Option<bool>,
    pub level_console: Option<String>,
    pub level_file: Option<String>,
}

impl LoggerConfig {
    pub fn from_file(file: Option<FileLoggerConfig>) -> Self {
        let defaults = Self::default();
        let Some(file) = file else {
            return defaults;
        };

        Self {
            dir: file.dir.map(PathBuf::from).unwrap_or(defaults.dir),
            max_size: file.max_size.unwrap_or(defaults.max_size),
            max_backups: file.max_backups.unwrap_or(defaults.max_backups),
            max_age: file.max_age.unwrap_or(defaults.max_age),
            compress: file.compress.unwrap_or(defaults.compress),
            level_console: file.level_console.unwrap_or(defaults.level_console),
            level_file: file.level_file.unwrap_or(defaults.level_file),
        }
    }
}
