//! Dedicated audit log for the distinguished device.
//!
//! Every lease transition involving the ECU is appended here so the desktop
//! host can tail a single small file instead of filtering the main server
//! log. The file is truncated at startup; only the current run is relevant.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use chrono::Utc;
use tracing::warn;

/// Append-only ECU transition log. All failures are logged and swallowed;
/// audit logging never interferes with address serving.
#[derive(Debug, Default)]
pub struct EcuAuditLog {
    file: Option<File>,
}

impl EcuAuditLog {
    /// Opens the log at `path`, removing any previous run's file first.
    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();

        if path.exists()
            && let Err(error) = std::fs::remove_file(path)
        {
            warn!("Failed to clear ECU log {}: {}", path.display(), error);
        }

        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => Self { file: Some(file) },
            Err(error) => {
                warn!("Failed to open ECU log {}: {}", path.display(), error);
                Self { file: None }
            }
        }
    }

    /// A disabled log that drops every line.
    pub fn disabled() -> Self {
        Self { file: None }
    }

    pub fn info(&self, message: &str) {
        if let Some(file) = &self.file {
            let line = format!("{} [INFO] {}\n", Utc::now().to_rfc3339(), message);
            if let Err(error) = (&*file).write_all(line.as_bytes()) {
                warn!("Failed to write ECU log line: {}", error);
            }
        }
    }
}
