//! Logging
//!
//! Two `tracing-subscriber` layers share one registry:
//!
//! - the console layer prints bare messages (no timestamp, target or level) to
//!   stdout. It shows INFO and above by default, DEBUG with `--verbose`, and
//!   only WARN and above with `--quiet`. Raw process output (target
//!   [`OUTPUT_TARGET`]) reaches the console only in verbose mode.
//! - the file layer writes every event at DEBUG and above, process output
//!   included, to the per-run log file. It is skipped entirely with
//!   `--no-log`.
//!
//! ## Environment Variables
//!
//! * `PLAYGROUND_LOG` - Overrides the console filter (e.g. `debug`,
//!   `playground_core::process=trace`)

use crate::context::ExecutionContext;
use crate::process::OUTPUT_TARGET;
use anyhow::Result;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::{Mutex, Once};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static INIT: Once = Once::new();

/// Environment variable overriding the console filter
pub const LOG_ENV: &str = "PLAYGROUND_LOG";

/// What to show and where to write it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogSettings {
    pub verbose: bool,
    pub quiet: bool,
    /// Per-run log file; `None` disables the file layer
    pub log_file: Option<PathBuf>,
}

impl LogSettings {
    pub fn from_context(context: &ExecutionContext) -> Self {
        Self {
            verbose: context.verbose,
            quiet: context.quiet,
            log_file: (!context.no_log).then(|| context.log_file.clone()),
        }
    }
}

/// Initialize the logging system
///
/// Subsequent calls are no-ops. When the log file cannot be created the
/// console layer is still installed and a warning is printed.
pub fn init(settings: &LogSettings) -> Result<()> {
    let mut outcome = Ok(());
    INIT.call_once(|| {
        outcome = install(settings);
    });
    outcome
}

fn install(settings: &LogSettings) -> Result<()> {
    let mut file_error = None;
    let file_layer = match &settings.log_file {
        Some(path) => match File::create(path) {
            Ok(file) => Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_writer(Mutex::new(file))
                    .with_filter(LevelFilter::DEBUG),
            ),
            Err(e) => {
                file_error = Some((path.clone(), e));
                None
            }
        },
        None => None,
    };

    let console_layer = fmt::layer()
        .without_time()
        .with_target(false)
        .with_level(false)
        .with_writer(io::stdout)
        .with_filter(console_filter(settings.verbose, settings.quiet));

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    if let Some((path, e)) = file_error {
        tracing::warn!(
            "Could not create log file {} ({}), logging to the console only",
            path.display(),
            e
        );
    }
    tracing::debug!("Logging initialized");
    Ok(())
}

/// Default console directives for the given verbosity
pub fn console_directives(verbose: bool, quiet: bool) -> String {
    if verbose {
        "debug".to_string()
    } else if quiet {
        "warn".to_string()
    } else {
        format!("info,{}=off", OUTPUT_TARGET)
    }
}

fn console_filter(verbose: bool, quiet: bool) -> EnvFilter {
    let default = console_directives(verbose, quiet);
    match std::env::var(LOG_ENV) {
        Ok(spec) => EnvFilter::try_new(&spec).unwrap_or_else(|_| EnvFilter::new(&default)),
        Err(_) => EnvFilter::new(&default),
    }
}

/// Check if logging has been initialized
pub fn is_initialized() -> bool {
    INIT.is_completed()
}
