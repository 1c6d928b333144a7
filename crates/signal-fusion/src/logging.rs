use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogRotation, LoggingConfig};

/// Install the global subscriber: JSON lines to a rolling file, plus an
/// optional compact mirror on stderr. Stdout is left to the binary's output.
///
/// The returned [`WorkerGuard`] must live as long as the process; dropping it
/// flushes the file writer.
pub fn init_tracing(logging: &LoggingConfig) -> Result<WorkerGuard> {
    std::fs::create_dir_all(&logging.log_dir)
        .with_context(|| format!("failed to create log directory: {}", logging.log_dir))?;

    let appender = RollingFileAppender::new(
        rotation(logging.rotation),
        &logging.log_dir,
        &logging.file_name,
    );
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    let console = logging.console.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .compact()
    });

    tracing_subscriber::registry()
        .with(env_filter(&logging.default_filter))
        .with(fmt::layer().with_writer(file_writer).with_ansi(false).json())
        .with(console)
        .try_init()
        .context("global tracing subscriber already installed")?;

    Ok(guard)
}

/// `RUST_LOG` wins; otherwise the configured directive, then plain `info`.
fn env_filter(default_directive: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

fn rotation(rotation: LogRotation) -> Rotation {
    match rotation {
        LogRotation::Hourly => Rotation::HOURLY,
        LogRotation::Daily => Rotation::DAILY,
        LogRotation::Never => Rotation::NEVER,
    }
}
