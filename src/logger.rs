//! tracing-subscriber setup.
//!
//! [`init`] is called once from `main` after the effective level is known
//! (CLI `-v` flags, then `RUST_LOG`, then `server.log_level`).

use std::fs::OpenOptions;
use std::path::Path;

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

use crate::error::AppError;

/// Install the global subscriber.
///
/// `level` is a plain level (`"warn"`, `"debug"`, ...) or a full `EnvFilter`
/// directive such as `"learnbot=debug,tower_http=warn"`. With
/// `prefer_level` the given level beats `RUST_LOG`; otherwise `RUST_LOG`
/// beats it. Lines go to stderr, or are appended to `log_file` when set.
pub fn init(level: &str, prefer_level: bool, log_file: Option<&Path>) -> Result<(), AppError> {
    let filter = build_filter(level, prefer_level)?;
    let writer = make_writer(log_file)?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(log_file.is_none())
        .try_init()
        .map_err(|e| AppError::Logger(format!("failed to set subscriber: {e}")))
}

fn build_filter(level: &str, prefer_level: bool) -> Result<EnvFilter, AppError> {
    let from_level = || -> Result<EnvFilter, AppError> {
        match parse_level(level) {
            Ok(filter) => Ok(EnvFilter::default().add_directive(filter.into())),
            Err(_) => EnvFilter::try_new(level)
                .map_err(|e| AppError::Logger(format!("invalid log level '{level}': {e}"))),
        }
    };

    if prefer_level {
        from_level().or_else(|level_err| {
            EnvFilter::try_from_default_env().map_err(|env_err| {
                AppError::Logger(format!("{level_err}; RUST_LOG parse failed: {env_err}"))
            })
        })
    } else {
        match EnvFilter::try_from_default_env() {
            Ok(filter) => Ok(filter),
            Err(_) => from_level(),
        }
    }
}

fn make_writer(log_file: Option<&Path>) -> Result<BoxMakeWriter, AppError> {
    let Some(path) = log_file else {
        return Ok(BoxMakeWriter::new(std::io::stderr));
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            AppError::Logger(format!("failed to open log file '{}': {e}", path.display()))
        })?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| AppError::Logger(format!("failed to open log file '{}': {e}", path.display())))?;
    Ok(BoxMakeWriter::new(file))
}

/// Parse a plain level name (`off`, `error` ... `trace`).
pub fn parse_level(level: &str) -> Result<LevelFilter, AppError> {
    let level = level.trim();
    if level.is_empty() {
        return Err(AppError::Logger("log level must not be empty".into()));
    }
    level
        .parse::<LevelFilter>()
        .map_err(|_| AppError::Logger(format!("unrecognised log level: '{level}'")))
}
