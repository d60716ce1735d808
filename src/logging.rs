//! Structured logging initialization
//!
//! The `[logging]` config section picks the destination (console, a
//! daily-rolling file, or both) and the format (pretty or JSON). An
//! explicit `RUST_LOG` overrides the configured level filter.

use std::path::Path;
use std::sync::OnceLock;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

use crate::config::get_config;

// Keeps the non-blocking file writer flushing for the process lifetime.
static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Initialize the logging system from the global configuration.
pub fn init_logging() {
    let config = get_config();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    let format = config.logging.format.as_str();
    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();
    match config.logging.output.as_str() {
        "file" => layers.push(file_layer(format, &config.logging.directory)),
        "both" => {
            layers.push(console_layer(format));
            layers.push(file_layer(format, &config.logging.directory));
        }
        _ => layers.push(console_layer(format)),
    }

    tracing_subscriber::registry().with(layers).with(filter).init();
}

fn console_layer(format: &str) -> Box<dyn Layer<Registry> + Send + Sync> {
    match format {
        "json" => fmt::layer()
            .json()
            .with_current_span(true)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        _ => fmt::layer().pretty().with_target(true).with_ansi(true).boxed(),
    }
}

fn file_layer(format: &str, directory: &Path) -> Box<dyn Layer<Registry> + Send + Sync> {
    let appender = tracing_appender::rolling::daily(directory, "crash-triage.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let _ = FILE_GUARD.set(guard);

    match format {
        "json" => fmt::layer()
            .json()
            .with_writer(writer)
            .with_current_span(true)
            .boxed(),
        _ => fmt::layer().with_writer(writer).with_ansi(false).boxed(),
    }
}
