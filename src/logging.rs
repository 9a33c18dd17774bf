use std::path::Path;

use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use crate::error::{CacheError, Result};

/// Initialize structured logging.
///
/// `RUST_LOG` wins over `log_level`. When `log_file` is given, a daily-rolling
/// JSON log is written next to it; keep the returned guard alive for as long as
/// file logging should flush.
pub fn init_logging(log_level: Option<&str>, log_file: Option<&Path>, json: bool) -> Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level.unwrap_or("info")))
        .map_err(|e| CacheError::Config(format!("Failed to create log filter: {e}")))?;

    let registry = Registry::default().with(env_filter);

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(!json)
        .with_target(true);

    let guard = if let Some(log_path) = log_file {
        let directory = log_path.parent().unwrap_or_else(|| Path::new("."));
        let file_name = log_path.file_name().map_or_else(|| "clinic-cache.log".into(), |n| n.to_os_string());
        let (writer, guard) = non_blocking(rolling::daily(directory, file_name));

        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(true)
            .json();

        registry
            .with(console_layer)
            .with(file_layer)
            .try_init()
            .map_err(|e| CacheError::Config(format!("Failed to install subscriber: {e}")))?;
        Some(guard)
    } else if json {
        registry
            .with(console_layer.json())
            .try_init()
            .map_err(|e| CacheError::Config(format!("Failed to install subscriber: {e}")))?;
        None
    } else {
        registry
            .with(console_layer)
            .try_init()
            .map_err(|e| CacheError::Config(format!("Failed to install subscriber: {e}")))?;
        None
    };

    info!("Logging system initialized");
    Ok(guard)
}

/// Logs how long an operation took.
#[derive(Debug)]
pub struct OperationTimer {
    operation: &'static str,
    start: std::time::Instant,
}

impl OperationTimer {
    /// Start timing `operation`.
    #[must_use]
    pub fn new(operation: &'static str) -> Self {
        Self { operation, start: std::time::Instant::now() }
    }

    /// Stop timing and log at info level. Returns elapsed milliseconds.
    pub fn finish(self) -> u128 {
        let duration = self.start.elapsed().as_millis();
        info!(operation = self.operation, duration_ms = duration, "Operation completed");
        std::mem::forget(self);
        duration
    }
}

impl Drop for OperationTimer {
    fn drop(&mut self) {
        if !std::thread::panicking() {
            tracing::debug!(
                operation = self.operation,
                duration_ms = self.start.elapsed().as_millis(),
                "Operation abandoned"
            );
        }
    }
}
