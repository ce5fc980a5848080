//! Logging setup for hubrelay.
//!
//! Every component logs through `tracing` with structured fields rather
//! than formatted text, so one operation can be followed across the relay:
//!
//! - `channel_id`: upstream channel a store mutation or hub handshake is for
//! - `mode`, `attempt`, `max_attempts`: hub handshake progress
//! - `video_id`, `destination`: announcement delivery
//! - `error`: the cause, rendered with `Display`
//!
//! Failures that are swallowed (a rejected payload, a failed sweep entry, a
//! failed chat send) are logged at `warn`; failures the operator must act on
//! (a subscribe that exhausted its retries, a store that could not be
//! written) at `error`. `RUST_LOG` directives are honoured on top of the
//! configured level.

use std::fs::{self, File, OpenOptions};
use std::path::Path;
use std::sync::Arc;

use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::Result;

/// Parse log level string to tracing Level. Unknown values mean `info`.
fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::from_default_env().add_directive(parse_level(level).into())
}

/// Open `path` for appending, creating missing parent directories.
///
/// The relay is long-running and restarted in place, so earlier runs are
/// kept rather than truncated.
fn open_log_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(OpenOptions::new().create(true).append(true).open(path)?)
}

/// Initialize logging from the `[logging]` section.
///
/// Without `file`, this is [`init_console_only`]. With `file`, every event
/// goes to both stdout and the file, without ANSI colours. Returns an error
/// (and installs nothing) when the file cannot be opened; the caller falls
/// back to console-only logging.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let Some(file) = config.file.as_deref() else {
        init_console_only(&config.level);
        return Ok(());
    };

    let log_file = open_log_file(Path::new(file))?;
    let writer = std::io::stdout.and(Arc::new(log_file));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true),
        )
        .with(env_filter(&config.level))
        .init();

    Ok(())
}

/// Initialize console-only logging at `level`.
pub fn init_console_only(level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_ansi(true)
                .with_target(true),
        )
        .with(env_filter(level))
        .init();
}
