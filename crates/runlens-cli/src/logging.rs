use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use tracing_appender::non_blocking::WorkerGuard;

pub const LOG_FILE: &str = "runlens.log";

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// JSON logs to a daily file under `log_dir`; the terminal belongs to the UI.
/// `RUST_LOG` overrides the default `info` filter.
pub fn init_tracing(log_dir: &Path) -> Result<(), String> {
    fs::create_dir_all(log_dir).map_err(|error| format!("{}: {error}", log_dir.display()))?;
    let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let _ = LOG_GUARD.set(guard);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .json()
        .with_writer(non_blocking)
        .try_init()
        .map_err(|error| error.to_string())
}
