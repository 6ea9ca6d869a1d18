//! Process-wide logger bootstrap.
//!
//! # Responsibility
//! - Start `flexi_logger` once per process, writing either rotated files
//!   under a directory or unbuffered stderr.
//! - Capture panics as one sanitized log line.
//!
//! # Invariants
//! - Repeating `init_logging` with the same level and target is a no-op.
//! - A different level or target after the first call is rejected.
//! - Initialization reports failures as `Err` and never panics.
//! - Topic names are user content and never reach a log line.

use flexi_logger::{Cleanup, Criterion, FileSpec, Logger, LoggerHandle, Naming, WriteMode};
use log::{error, info};
use once_cell::sync::OnceCell;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

const LOG_FILE_BASENAME: &str = "mindmap";
const ROTATE_AT_BYTES: u64 = 10 * 1024 * 1024;
const KEEP_FILES: usize = 5;
const PANIC_PAYLOAD_LIMIT: usize = 160;
const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

static ACTIVE: OnceCell<ActiveLogger> = OnceCell::new();
static PANIC_HOOK: OnceCell<()> = OnceCell::new();

/// Where log lines are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    /// Size-rotated files under an absolute directory.
    Directory(PathBuf),
    /// Unbuffered stderr.
    Stderr,
}

impl LogTarget {
    /// Directory target from a user-supplied path.
    ///
    /// # Errors
    /// - The trimmed path is empty or relative.
    pub fn directory(path: &str) -> Result<Self, String> {
        let trimmed = path.trim();
        if trimmed.is_empty() {
            return Err("log directory cannot be empty".to_string());
        }
        if !Path::new(trimmed).is_absolute() {
            return Err(format!("log directory must be absolute, got `{trimmed}`"));
        }
        Ok(Self::Directory(PathBuf::from(trimmed)))
    }
}

impl Display for LogTarget {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Directory(path) => write!(f, "{}", path.display()),
            Self::Stderr => write!(f, "stderr"),
        }
    }
}

struct ActiveLogger {
    level: &'static str,
    target: LogTarget,
    _handle: LoggerHandle,
}

impl ActiveLogger {
    fn accepts(&self, level: &'static str, target: &LogTarget) -> Result<(), String> {
        if &self.target != target {
            return Err(format!(
                "logging already writes to `{}`; refusing to switch to `{target}`",
                self.target
            ));
        }
        if self.level != level {
            return Err(format!(
                "logging already runs at `{}`; refusing to switch to `{level}`",
                self.level
            ));
        }
        Ok(())
    }
}

/// Starts logging at `level` into `target`.
///
/// # Errors
/// - `level` is not one of trace, debug, info, warn (or warning), error.
/// - A directory target cannot be created or the backend fails to start.
/// - Logging is already active with another level or target.
pub fn init_logging(level: &str, target: LogTarget) -> Result<(), String> {
    let level = parse_level(level)?;
    if let Some(active) = ACTIVE.get() {
        return active.accepts(level, &target);
    }

    let active = ACTIVE.get_or_try_init(|| -> Result<ActiveLogger, String> {
        let handle = start_backend(level, &target)?;
        install_panic_hook();
        info!(
            "event=core_init module=core status=ok level={} target={} version={}",
            level,
            target,
            env!("CARGO_PKG_VERSION")
        );
        Ok(ActiveLogger {
            level,
            target: target.clone(),
            _handle: handle,
        })
    })?;
    // Another thread may have won the race with different settings.
    active.accepts(level, &target)
}

/// Active `(level, target)`, or `None` before `init_logging` succeeded.
pub fn logging_status() -> Option<(&'static str, LogTarget)> {
    ACTIVE
        .get()
        .map(|active| (active.level, active.target.clone()))
}

/// `debug` in debug builds, `info` otherwise.
pub fn default_log_level() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    }
}

fn parse_level(raw: &str) -> Result<&'static str, String> {
    let lowered = raw.trim().to_ascii_lowercase();
    let wanted = if lowered == "warning" { "warn" } else { lowered.as_str() };
    LEVELS
        .iter()
        .find(|level| **level == wanted)
        .copied()
        .ok_or_else(|| format!("unknown log level `{raw}`; expected one of {}", LEVELS.join("|")))
}

fn start_backend(level: &'static str, target: &LogTarget) -> Result<LoggerHandle, String> {
    let logger =
        Logger::try_with_str(level).map_err(|err| format!("invalid log level `{level}`: {err}"))?;
    let logger = match target {
        LogTarget::Directory(dir) => {
            std::fs::create_dir_all(dir)
                .map_err(|err| format!("cannot create log directory `{}`: {err}", dir.display()))?;
            logger
                .log_to_file(FileSpec::default().directory(dir.as_path()).basename(LOG_FILE_BASENAME))
                .rotate(
                    Criterion::Size(ROTATE_AT_BYTES),
                    Naming::Numbers,
                    Cleanup::KeepLogFiles(KEEP_FILES),
                )
                .write_mode(WriteMode::BufferAndFlush)
                .append()
                .format_for_files(flexi_logger::detailed_format)
        }
        LogTarget::Stderr => logger
            .log_to_stderr()
            .write_mode(WriteMode::Direct)
            .format_for_stderr(flexi_logger::detailed_format),
    };
    logger
        .start()
        .map_err(|err| format!("cannot start logger: {err}"))
}

fn install_panic_hook() {
    if PANIC_HOOK.set(()).is_err() {
        return;
    }
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let location = info
            .location()
            .map(|loc| format!("{}:{}", loc.file(), loc.line()))
            .unwrap_or_else(|| "unknown".to_string());
        let payload = info
            .payload()
            .downcast_ref::<&str>()
            .map(|message| (*message).to_string())
            .or_else(|| info.payload().downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        // Payloads can quote topic text.
        error!(
            "event=panic module=core status=error location={} payload={}",
            location,
            one_line(&payload, PANIC_PAYLOAD_LIMIT)
        );
        previous(info);
    }));
}

/// Collapses line breaks and caps `text` at `limit` characters.
fn one_line(text: &str, limit: usize) -> String {
    let flat = text.replace(['\n', '\r'], " ");
    if flat.chars().count() <= limit {
        return flat;
    }
    let mut capped: String = flat.chars().take(limit).collect();
    capped.push_str("...");
    capped
}
