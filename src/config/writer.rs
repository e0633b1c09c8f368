//! `writer:` section.

use serde::Deserialize;

#[derive(Debug, Clone)]
pub struct WriterConfig {
    pub clickhouse: String,
    pub batch: usize,
    pub buffer: usize,
    /// Wait window in seconds before an in-progress batch accumulation is
    /// cut short, even if `batch` hasn't been reached. Negative disables
    /// the wait-window cutoff (the batch only ends on size or shutdown).
    pub wait: i64,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            clickhouse: String::new(),
            batch: 32_768,
            buffer: 32_768,
            wait: -1,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct FileWriterConfig {
    pub clickhouse: Option<String>,
    pub batch: Option<usize>,
    pub buffer: Option<usize>,
    pub wait: Option<i64>,
}

impl WriterConfig {
    pub fn from_file(file: Option<FileWriterConfig>) -> Self {
        let defaults = Self::default();
        let Some(file) = file else {
            return defaults;
        };

        Self {
            clickhouse: file.clickhouse.unwrap_or(defaults.clickhouse),
            batch: file.batch.unwrap_or(defaults.batch),
            buffer: file.buffer.unwrap_or(defaults.buffer),
            wait: file.wait.unwrap_or(defaults.wait),
        }
    }
}
