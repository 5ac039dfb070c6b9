use std::{fs, io, path::Path};

use thiserror::Error;
use tracing_appender::{
    non_blocking,
    non_blocking::{NonBlocking, WorkerGuard},
    rolling::{InitError, RollingFileAppender, Rotation},
};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::LoggingConfig;

#[derive(Error, Debug)]
pub enum LoggerError {
    #[error("failed to create log directory: {0}")]
    Io(#[from] io::Error),
    #[error("failed to open log file: {0}")]
    Appender(#[from] InitError),
}

/// Keeps the non-blocking writers flushing; logging stops once this is dropped.
pub struct TracingGuards {
    _file: WorkerGuard,
    _stdout: WorkerGuard,
}

/// Installs the global subscriber: a plain-text daily file plus stdout.
///
/// `RUST_LOG` overrides the stdout level; the file keeps `file_level`.
pub fn init_tracing(config: &LoggingConfig) -> Result<TracingGuards, LoggerError> {
    let (file_writer, file_guard) = daily_file_appender(&config.log_dir, &config.file_prefix)?;
    let (stdout_writer, stdout_guard) = non_blocking(io::stdout());

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let file_filter = EnvFilter::new(&config.file_level);

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_writer(file_writer)
                .with_filter(file_filter),
        )
        .with(
            fmt::layer()
                .with_writer(stdout_writer)
                .with_ansi(true)
                .with_filter(env_filter),
        )
        .init();

    Ok(TracingGuards {
        _file: file_guard,
        _stdout: stdout_guard,
    })
}

/// `{dir}/{prefix}.{YYYY-MM-DD}.log`, rolled over at UTC midnight.
fn daily_file_appender(
    dir: &Path,
    prefix: &str,
) -> Result<(NonBlocking, WorkerGuard), LoggerError> {
    Ok(non_blocking(rolling_appender(dir, prefix)?))
}

fn rolling_appender(dir: &Path, prefix: &str) -> Result<RollingFileAppender, LoggerError> {
    fs::create_dir_all(dir)?;
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(prefix)
        .filename_suffix("log")
        .build(dir)?;
    Ok(appender)
}
