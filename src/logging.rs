use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Where log records go. The TUI owns the terminal, so it always logs to a
/// file; line mode may log to stderr instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTarget<'a> {
    File(&'a Path),
    Stderr,
}

fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

pub fn init_logging(level: &str, target: LogTarget<'_>) -> Result<()> {
    let builder = FmtSubscriber::builder()
        .with_env_filter(env_filter(level))
        .with_ansi(false)
        .with_file(true)
        .with_line_number(true);

    match target {
        LogTarget::File(path) => {
            let log_file = std::sync::Arc::new(
                std::fs::File::create(path)
                    .with_context(|| format!("create log file: {}", path.display()))?,
            );
            let subscriber = builder.with_writer(log_file).finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        LogTarget::Stderr => {
            let subscriber = builder.with_writer(std::io::stderr).finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }
    info!(log_level = level, "logging initialized");
    Ok(())
}
