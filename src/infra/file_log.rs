//! Append-only text delivery logs.

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::core::{DeliveryLog, DeliveryRecord, LogKind};

/// Writes successful sends to one file and everything else to another, one
/// line per record.
///
/// Lines are buffered in memory and reach disk on [`DeliveryLog::flush`], when
/// a buffer fills, or when the log is dropped.
pub struct FileDeliveryLog {
    success_path: PathBuf,
    error_path: PathBuf,
    success: BufWriter<File>,
    error: BufWriter<File>,
}

impl FileDeliveryLog {
    /// Open (creating if needed) both log files in append mode.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if either file cannot be opened.
    pub fn open(success_path: impl AsRef<Path>, error_path: impl AsRef<Path>) -> io::Result<Self> {
        let success_path = success_path.as_ref().to_path_buf();
        let error_path = error_path.as_ref().to_path_buf();
        Ok(Self {
            success: BufWriter::new(append(&success_path)?),
            error: BufWriter::new(append(&error_path)?),
            success_path,
            error_path,
        })
    }

    /// Path of the success log.
    #[must_use]
    pub fn success_path(&self) -> &Path {
        &self.success_path
    }

    /// Path of the error log.
    #[must_use]
    pub fn error_path(&self) -> &Path {
        &self.error_path
    }
}

fn append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

impl DeliveryLog for FileDeliveryLog {
    fn record(&mut self, record: DeliveryRecord) {
        let (file, path) = match record.kind() {
            LogKind::Success => (&mut self.success, &self.success_path),
            LogKind::Error => (&mut self.error, &self.error_path),
        };
        if let Err(e) = writeln!(file, "{}", record.to_line()) {
            tracing::error!(path = %path.display(), error = %e, "failed to write delivery log");
        }
    }

    fn flush(&mut self) {
        for (file, path) in [
            (&mut self.success, &self.success_path),
            (&mut self.error, &self.error_path),
        ] {
            if let Err(e) = file.flush() {
                tracing::error!(path = %path.display(), error = %e, "failed to flush delivery log");
            }
        }
    }
}
