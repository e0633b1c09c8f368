//! `reader:` section.

use serde::Deserialize;

/// Which of the three interchangeable read-planning strategies to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderMode {
    /// Quantile-aggregated single-table.
    QuantileAggregated,
    /// Ordered single-table with client-side dedup.
    StreamingOrdered,
    /// Two-query metrics/samples join via fingerprint.
    DualTableJoin,
}

impl ReaderMode {
    fn from_u8(v: u8) -> anyhow::Result<Self> {
        match v {
            1 => Ok(ReaderMode::QuantileAggregated),
            2 => Ok(ReaderMode::StreamingOrdered),
            3 => Ok(ReaderMode::DualTableJoin),
            other => anyhow::bail!("reader.mode must be 1, 2, or 3 (got {other})"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReaderConfig {
    pub max_samples: u32,
    pub min_step: u32,
    pub quantile: f64,
    pub clickhouse: String,
    pub mode: ReaderMode,
    pub utc: bool,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            max_samples: 11_000,
            min_step: 15,
            quantile: 0.75,
            clickhouse: String::new(),
            mode: ReaderMode::QuantileAggregated,
            utc: false,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct FileReaderConfig {
    pub max_samples: Option<u32>,
    pub min_step: Option<u32>,
    pub quantile: Option<f64>,
    pub clickhouse: Option<String>,
    pub mode: Option<u8>,
    pub utc: Option<bool>,
}

impl ReaderConfig {
    pub fn from_file(file: Option<FileReaderConfig>) -> anyhow::Result<Self> {
        let defaults = Self::default();
        let Some(file) = file else {
            return Ok(defaults);
        };

        let quantile = file
            .quantile
            .map(|q| q.clamp(0.0, 1.0))
            .unwrap_or(defaults.quantile);

        let mode = match file.mode {
            Some(m) => ReaderMode::from_u8(m)?,
            None => defaults.mode,
        };

        Ok(Self {
            max_samples: file.max_samples.unwrap_or(defaults.max_samples),
            min_step: file.min_step.unwrap_or(defaults.min_step),
            quantile,
            clickhouse: file.clickhouse.unwrap_or(defaults.clickhouse),
            mode,
            utc: file.utc.unwrap_or(defaults.utc),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantile_clamped_to_unit_interval() {
        let cfg = ReaderConfig::from_file(Some(FileReaderConfig {
            quantile: Some(1.5),
            ..Default::default()
        }))
        .unwrap();
        assert_eq!(cfg.quantile, 1.0);

        let cfg = ReaderConfig::from_file(Some(FileReaderConfig {
            quantile: Some(-0.2),
            ..Default::default()
        }))
        .unwrap();
        assert_eq!(cfg.quantile, 0.0);
    }

    #[test]
    fn invalid_mode_rejected() {
        let err = ReaderConfig::from_file(Some(FileReaderConfig {
            mode: Some(4),
            ..Default::default()
        }))
        .unwrap_err();
        assert!(err.to_string().contains("mode"));
    }
}
