//! Logging setup: timestamped INFO/ERROR lines to the console and to a
//! dated file under the logs directory.

use crate::error::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Path of today's log file under `logs_dir`
#[must_use]
pub fn log_file_path(logs_dir: &Path) -> PathBuf {
    let stamp = chrono::Local::now().format("%Y%m%d");
    logs_dir.join(format!("confab_{stamp}.log"))
}

/// Initialize the global subscriber. Respects `RUST_LOG`, defaulting to
/// `info`. Returns the log file path in use.
pub fn init(logs_dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(logs_dir)?;
    let path = log_file_path(logs_dir);
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(Arc::new(file)),
        )
        .init();

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_file_path_is_dated() {
        let path = log_file_path(Path::new("/var/log/confab"));
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("confab_"));
        assert!(name.ends_with(".log"));
        // confab_YYYYMMDD.log
        assert_eq!(name.len(), "confab_20260101.log".len());
    }
}
