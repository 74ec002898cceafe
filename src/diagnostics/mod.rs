//! Diagnostics sink
//!
//! Collects the short debug lines shown on the console and the persistent
//! log on external storage. One [`Diagnostics`] value is created at startup
//! and handed to every component that reports progress.

pub mod log_file;
pub mod ring;

pub use log_file::LogFile;
pub use ring::{DebugRing, DEBUG_RING_CAPACITY};

use std::path::Path;

/// Ring of recent debug lines plus an optional log file.
///
/// Lifecycle: [`open`](Self::open), use, [`flush`](Self::flush) at
/// checkpoints, [`close`](Self::close).
#[derive(Debug, Default)]
pub struct Diagnostics {
    ring: DebugRing,
    log: Option<LogFile>,
}

impl Diagnostics {
    /// Opens the log at `path`. If it cannot be opened the sink keeps
    /// working with the ring buffer only.
    pub fn open(path: &Path) -> Self {
        let log = match LogFile::open(path) {
            Ok(log) => {
                tracing::info!("Logging to {}", path.display());
                Some(log)
            }
            Err(e) => {
                tracing::warn!("Could not open log file {}: {}", path.display(), e);
                None
            }
        };
        Self {
            ring: DebugRing::default(),
            log,
        }
    }

    /// A sink without a log file.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Appends a line to the log file. Not flushed.
    pub fn line(&mut self, line: impl AsRef<str>) {
        let line = line.as_ref();
        tracing::debug!(target: "llama_console::log", "{}", line);
        if let Some(log) = self.log.as_mut() {
            if let Err(e) = log.write_line(line) {
                tracing::warn!("Log write failed: {}", e);
            }
        }
    }

    /// Adds a line to the on-screen debug ring.
    pub fn push_debug(&mut self, line: impl Into<String>) {
        self.ring.push(line);
    }

    /// Flushes and syncs the log file.
    pub fn flush(&mut self) {
        if let Some(log) = self.log.as_mut() {
            if let Err(e) = log.flush() {
                tracing::warn!("Log flush failed: {}", e);
            }
        }
    }

    /// Flushes and releases the log file.
    pub fn close(mut self) {
        self.flush();
        if let Some(log) = self.log.take() {
            tracing::debug!("Closed log {}", log.path().display());
        }
    }

    pub fn debug_lines(&self) -> &[String] {
        self.ring.lines()
    }

    pub fn log_path(&self) -> Option<&Path> {
        self.log.as_ref().map(LogFile::path)
    }
}
