//! Session logger — backs the `log` facade with a single file in the OS data
//! directory.
//!
//! The file is **truncated (overwritten) at each launch**, so it only ever
//! contains output from the most-recent session.
//!
//! Log location:
//!   Windows:  `%APPDATA%\Visionary\visionary.log`
//!   Linux:    `~/.local/share/Visionary/visionary.log`
//!   macOS:    `~/Library/Application Support/Visionary/visionary.log`
//!
//! The level comes from `VISIONARY_LOG` (`error`, `warn`, `info`, `debug`,
//! `trace`, `off`), default `info`. Panics are mirrored into the file.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};

use log::{LevelFilter, Log, Metadata, Record};

const LEVEL_ENV: &str = "VISIONARY_LOG";

static LOG_FILE: OnceLock<Mutex<File>> = OnceLock::new();
static LOG_PATH: OnceLock<PathBuf> = OnceLock::new();
static INSTALLED: OnceLock<()> = OnceLock::new();

/// Returns the path to the current session log file.
pub fn log_path() -> Option<&'static PathBuf> {
    LOG_PATH.get()
}

/// Write a line to the session log. I/O errors are ignored.
pub fn write_line(line: &str) {
    if let Some(mutex) = LOG_FILE.get()
        && let Ok(mut file) = mutex.lock()
    {
        let _ = writeln!(file, "{}", line);
    }
}

struct SessionLogger {
    level: LevelFilter,
    /// Also print to stderr (CLI `--verbose`).
    echo: bool,
}

impl Log for SessionLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format_line(&timestamp(), record.level(), record.target(), &record.args().to_string());
        write_line(&line);
        if self.echo {
            eprintln!("{}", line);
        }
    }

    fn flush(&self) {
        if let Some(mutex) = LOG_FILE.get()
            && let Ok(mut file) = mutex.lock()
        {
            let _ = file.flush();
        }
    }
}

/// Initialise the session logger at the level from `VISIONARY_LOG`.
pub fn init() {
    init_with(level_from_env(), false);
}

/// Initialise the session logger. Only the first call has any effect.
///
/// * Creates (or truncates) the log file.
/// * Installs the logger behind the `log` facade.
/// * Installs a panic hook that writes the panic message to the log before
///   propagating to the default handler.
pub fn init_with(level: LevelFilter, echo: bool) {
    if INSTALLED.set(()).is_err() {
        return;
    }

    let path = log_file_path();
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    match OpenOptions::new().create(true).write(true).truncate(true).open(&path) {
        Ok(f) => {
            let _ = LOG_PATH.set(path.clone());
            let _ = LOG_FILE.set(Mutex::new(f));
            write_line(&format!("=== Visionary session started {} ===", human_timestamp()));
            write_line(&format!("Log file: {}", path.display()));
            write_line("");
        }
        // Not fatal: records still reach stderr when echoing.
        Err(e) => eprintln!("[logger] Failed to open log file {:?}: {}", path, e),
    }

    if log::set_boxed_logger(Box::new(SessionLogger { level, echo })).is_ok() {
        log::set_max_level(level);
    }

    let prev = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        write_line(&format!("[{}] [PANIC] {}", timestamp(), info));
        prev(info);
    }));
}

/// Level named by `VISIONARY_LOG`, `info` when unset or unrecognised.
pub fn level_from_env() -> LevelFilter {
    std::env::var(LEVEL_ENV)
        .ok()
        .and_then(|v| parse_level(&v))
        .unwrap_or(LevelFilter::Info)
}

pub fn parse_level(s: &str) -> Option<LevelFilter> {
    s.trim().parse::<LevelFilter>().ok()
}

/// `[HH:MM:SS] [LEVEL] target: message`
fn format_line(ts: &str, level: log::Level, target: &str, msg: &str) -> String {
    format!("[{}] [{}] {}: {}", ts, level, target, msg)
}

fn log_file_path() -> PathBuf {
    data_dir().join("Visionary").join("visionary.log")
}

/// Platform data directory (without the app sub-folder).
fn data_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata);
        }
    }
    #[cfg(target_os = "macos")]
    {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join("Library").join("Application Support");
        }
    }
    if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(xdg);
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".local").join("share");
    }
    PathBuf::from(".")
}

fn timestamp() -> String {
    chrono::Local::now().format("%H:%M:%S").to_string()
}

fn human_timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_names() {
        assert_eq!(parse_level("debug"), Some(LevelFilter::Debug));
        assert_eq!(parse_level(" WARN "), Some(LevelFilter::Warn));
        assert_eq!(parse_level("off"), Some(LevelFilter::Off));
        assert_eq!(parse_level("chatty"), None);
    }

    #[test]
    fn line_layout() {
        assert_eq!(
            format_line("12:34:56", log::Level::Warn, "visionary::project", "generator returned no image"),
            "[12:34:56] [WARN] visionary::project: generator returned no image"
        );
    }

    #[test]
    fn timestamp_is_clock_time() {
        let ts = timestamp();
        assert_eq!(ts.len(), 8);
        assert_eq!(ts.as_bytes()[2], b':');
    }

    #[test]
    fn log_file_lives_in_app_folder() {
        let p = log_file_path();
        assert!(p.ends_with("Visionary/visionary.log") || p.ends_with("Visionary\\visionary.log"));
    }
}
