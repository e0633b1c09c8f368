//! Self-observability counters and histogram, exposed on `GET /metrics`
//! in the Prometheus text exposition format.

use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, Registry, TextEncoder};

pub struct Metrics {
    registry: Registry,
    pub received_samples_total: IntCounter,
    pub write_samples_total: IntCounter,
    pub write_failed_samples_total: IntCounter,
    pub write_batch_duration_seconds: Histogram,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let received_samples_total = IntCounter::new(
            "received_samples_total",
            "Samples accepted from write requests, before enqueueing.",
        )?;
        let write_samples_total = IntCounter::new(
            "write_samples_total",
            "Samples actually committed in a batch.",
        )?;
        let write_failed_samples_total = IntCounter::new(
            "write_failed_samples_total",
            "Samples dropped after a persistent prepare/bootstrap failure.",
        )?;
        let write_batch_duration_seconds = Histogram::with_opts(HistogramOpts::new(
            "write_batch_duration_seconds",
            "Wall time from begin-transaction to commit for a single batch.",
        ))?;

        registry.register(Box::new(received_samples_total.clone()))?;
        registry.register(Box::new(write_samples_total.clone()))?;
        registry.register(Box::new(write_failed_samples_total.clone()))?;
        registry.register(Box::new(write_batch_duration_seconds.clone()))?;

        Ok(Self {
            registry,
            received_samples_total,
            write_samples_total,
            write_failed_samples_total,
            write_batch_duration_seconds,
        })
    }

    /// Renders the current state of every registered metric in the
    /// Prometheus text exposition format.
    pub fn render(&self) -> anyhow::Result<String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_includes_every_metric_name() {
        let metrics = Metrics::new().unwrap();
        metrics.received_samples_total.inc();
        let output = metrics.render().unwrap();

        assert!(output.contains("received_samples_total"));
        assert!(output.contains("write_samples_total"));
        assert!(output.contains("write_failed_samples_total"));
        assert!(output.contains("write_batch_duration_seconds"));
    }
}
