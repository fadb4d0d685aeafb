use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::LoggingConfig;

/// Keeps the file appender worker alive; hold it until shutdown.
pub struct LogGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Initialize tracing from the logging section.
///
/// `RUST_LOG` wins over `logging.level` when set. When `logging.file` is set,
/// a daily-rolling plain-text copy of the log is written next to stdout.
pub fn init_logging(config: &LoggingConfig) -> LogGuard {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let mut file_guard = None;
    let file_layer = config.file.as_deref().and_then(|file| {
        let path = Path::new(file);
        let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
        let name = path.file_name()?.to_string_lossy().to_string();

        if let Err(e) = std::fs::create_dir_all(dir) {
            eprintln!("Failed to create log directory {}: {}", dir.display(), e);
            return None;
        }

        let appender = RollingFileAppender::new(Rotation::DAILY, dir, name);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        file_guard = Some(guard);

        Some(fmt::layer().with_ansi(false).with_target(true).with_writer(writer))
    });

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true))
        .with(file_layer)
        .try_init();

    LogGuard { _file_guard: file_guard }
}

/// Run `f` under a temporary stderr subscriber.
///
/// Configuration is loaded before `init_logging` can run, so the loader's
/// override and validation messages go through this one instead.
pub fn with_startup_logging<T>(f: impl FnOnce() -> T) -> T {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    with_startup_logging_to(std::io::stderr, env_filter, f)
}

fn with_startup_logging_to<W, T>(writer: W, env_filter: EnvFilter, f: impl FnOnce() -> T) -> T
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    let subscriber = fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_ansi(false)
        .with_writer(writer)
        .finish();
    tracing::subscriber::with_default(subscriber, f)
}
