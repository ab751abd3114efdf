//! Tracing subscriber setup.
//!
//! Filter precedence: `RUST_LOG`, then `--verbose` (debug), then the
//! configured `logging.level`. Terminal output goes to stderr so stdout only
//! carries command summaries.

use anyhow::Context;
use portalsync_domain::LoggingConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const LOG_FILE_PREFIX: &str = "portalsync.log";

/// Install the global subscriber.
///
/// The returned guard flushes the file writer on drop and must live until
/// the process exits.
pub fn init(config: &LoggingConfig, verbose: bool) -> anyhow::Result<Option<WorkerGuard>> {
    let terminal_layer = if config.json {
        fmt::layer().json().with_writer(std::io::stderr).with_filter(filter(config, verbose)).boxed()
    } else {
        fmt::layer()
            .with_target(verbose)
            .with_writer(std::io::stderr)
            .compact()
            .with_filter(filter(config, verbose))
            .boxed()
    };

    let (file_layer, guard) = match &config.directory {
        Some(directory) => {
            std::fs::create_dir_all(directory)
                .with_context(|| format!("Failed to create log directory {}", directory.display()))?;
            let (writer, guard) = tracing_appender::non_blocking(rolling::daily(directory, LOG_FILE_PREFIX));
            let layer = fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(filter(config, verbose))
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(terminal_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to initialize logging")?;

    Ok(guard)
}

fn filter(config: &LoggingConfig, verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive(config, verbose)))
}

fn default_directive(config: &LoggingConfig, verbose: bool) -> String {
    let level = if verbose { "debug" } else { config.level.as_str() };
    // Keep HTTP internals quiet unless asked for explicitly.
    format!("{level},hyper=warn,reqwest=warn,rustls=warn")
}
