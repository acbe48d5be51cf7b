//! Logging and tracing initialization.

use std::fs::File;
use std::path::Path;
use std::sync::Mutex;

use crate::config::LoggingConfig;

/// Initialize the tracing subscriber with the given configuration.
///
/// When `config.file` is set, output goes to that file (appended,
/// ANSI-free) instead of stderr; an unopenable file falls back to
/// stderr so a render never runs blind.
pub fn init_logging(config: &LoggingConfig) {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let file_sink = config.file.as_deref().and_then(open_log_file);

    match (config.json, file_sink) {
        (true, Some(file)) => {
            let subscriber = fmt::Subscriber::builder()
                .with_env_filter(env_filter)
                .json()
                .with_writer(Mutex::new(file))
                .finish();
            tracing::subscriber::set_global_default(subscriber).ok();
        }
        (true, None) => {
            let subscriber = fmt::Subscriber::builder()
                .with_env_filter(env_filter)
                .json()
                .finish();
            tracing::subscriber::set_global_default(subscriber).ok();
        }
        (false, Some(file)) => {
            let subscriber = fmt::Subscriber::builder()
                .with_env_filter(env_filter)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .finish();
            tracing::subscriber::set_global_default(subscriber).ok();
        }
        (false, None) => {
            let subscriber = fmt::Subscriber::builder()
                .with_env_filter(env_filter)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .finish();
            tracing::subscriber::set_global_default(subscriber).ok();
        }
    }
}

/// Initialize logging with defaults (useful for tests and quick scripts).
pub fn init_default_logging() {
    init_logging(&LoggingConfig::default());
}

/// Open the configured log file for appending, creating parent
/// directories. Returns None (and reports to stderr) when it cannot be
/// opened.
fn open_log_file(path: &Path) -> Option<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                eprintln!("Cannot create log directory {}: {e}", parent.display());
                return None;
            }
        }
    }
    match std::fs::OpenOptions::new().create(true).append(true).open(path) {
        Ok(file) => Some(file),
        Err(e) => {
            eprintln!("Cannot open log file {}: {e}", path.display());
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn log_file_is_created_with_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("reelforge.log");
        let file = open_log_file(&path);
        assert!(file.is_some());
        assert!(path.exists());
    }

    #[test]
    fn log_file_is_opened_for_append() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reelforge.log");
        std::fs::write(&path, "first\n").unwrap();
        let mut file = open_log_file(&path).unwrap();
        writeln!(file, "second").unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "first\nsecond\n");
    }

    #[test]
    fn unopenable_log_file_yields_none() {
        let dir = tempfile::tempdir().unwrap();
        let clash = dir.path().join("not-a-file");
        std::fs::create_dir_all(&clash).unwrap();
        // A directory at the target path cannot be opened as a file.
        assert!(open_log_file(&clash).is_none());
    }

    #[test]
    fn repeated_initialization_is_harmless() {
        let dir = tempfile::tempdir().unwrap();
        let config = LoggingConfig {
            level: "debug".to_string(),
            json: false,
            file: Some(dir.path().join("init.log")),
        };
        init_logging(&config);
        init_logging(&config);
        assert!(dir.path().join("init.log").exists());
    }
}
