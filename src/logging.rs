use anyhow::{Context, Result};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber.
///
/// Logs go to stderr so stdout stays reserved for command output. With a log
/// file configured, a second non-blocking layer appends to it; the returned
/// guard must live until exit or buffered lines are lost.
pub fn init_logging(verbose: bool, log_file: Option<&str>) -> Result<Option<WorkerGuard>> {
    let default_directive = if verbose { "consld8=debug" } else { "consld8=info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);

    let Some(path) = log_file else {
        tracing_subscriber::registry().with(filter).with(stderr_layer).init();
        return Ok(None);
    };

    let path = Path::new(path);
    let directory = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    let file_name = path
        .file_name()
        .with_context(|| format!("Log file path has no file name: {}", path.display()))?;
    std::fs::create_dir_all(directory)
        .with_context(|| format!("Failed to create log directory: {}", directory.display()))?;

    let file_appender = tracing_appender::rolling::never(directory, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    Ok(Some(guard))
}
